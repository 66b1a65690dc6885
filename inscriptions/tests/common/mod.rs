//! Shared harness: the full router over in-memory backends.

#![allow(dead_code)] // Not every test binary uses every helper
#![allow(clippy::unwrap_used, clippy::expect_used)]

use aca_inscriptions::auth::{AuthenticatedUser, InMemorySessionVerifier, SessionVerifier};
use aca_inscriptions::cache::{CacheInvalidator, InMemoryListingCache, ListingCache};
use aca_inscriptions::server::{build_router, AppState};
use aca_inscriptions::store::{InMemoryRegistrationStore, RegistrationStore};
use aca_inscriptions::types::{Event, EventStatus, EventType, Inscription, InscriptionStatus, Role};
use aca_inscriptions::{CancellationPolicy, EventListingService, InscriptionService};
use aca_testing::{test_epoch, ManualClock};
use aca_web::cors::CorsConfig;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Bearer token of member `U`, owner of `I42`.
pub const OWNER: &str = "tok-u";
/// Bearer token of member `U2`.
pub const OTHER: &str = "tok-u2";
/// Bearer token of an organizer.
pub const ORGANIZER: &str = "tok-org";

pub struct TestApp {
    pub store: Arc<InMemoryRegistrationStore>,
    pub cache: Arc<InMemoryListingCache>,
    pub clock: ManualClock,
    pub router: Router,
}

pub struct Options {
    pub policy: CancellationPolicy,
    pub legacy_sweep: bool,
    pub allow_origin: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            policy: CancellationPolicy::OwnerOnly,
            legacy_sweep: true,
            allow_origin: "*".to_string(),
        }
    }
}

pub fn event(id: &str, title: &str, participants: u32) -> Event {
    Event {
        id: id.into(),
        title: title.to_string(),
        event_type: EventType::Encuentro,
        status: EventStatus::Published,
        registration_open: true,
        current_participants: participants,
        max_participants: Some(40),
        starts_at: test_epoch(),
        created_at: test_epoch(),
    }
}

pub fn inscription(id: &str, user: &str, event_id: &str, status: InscriptionStatus) -> Inscription {
    Inscription {
        id: id.into(),
        user_id: user.into(),
        event_id: event_id.into(),
        status,
        created_at: test_epoch(),
    }
}

pub fn app() -> TestApp {
    app_with(Options::default())
}

pub fn app_with(options: Options) -> TestApp {
    let clock = ManualClock::new(test_epoch());
    let store = Arc::new(InMemoryRegistrationStore::new());
    let cache = Arc::new(InMemoryListingCache::new(Arc::new(clock.clone())));

    let sessions = InMemorySessionVerifier::new()
        .with_session(OWNER, AuthenticatedUser::member("U"))
        .with_session(OTHER, AuthenticatedUser::member("U2"))
        .with_session(
            ORGANIZER,
            AuthenticatedUser {
                user_id: "ORG".into(),
                role: Role::Organizer,
            },
        );

    let store_dyn: Arc<dyn RegistrationStore> = store.clone();
    let cache_dyn: Arc<dyn ListingCache> = cache.clone();
    let inscriptions = InscriptionService::new(
        Arc::clone(&store_dyn),
        CacheInvalidator::new(Arc::clone(&cache_dyn), options.legacy_sweep),
        options.policy,
        Arc::new(clock.clone()),
    );
    let listing = EventListingService::new(store_dyn, cache_dyn, Duration::from_secs(60));
    let sessions: Arc<dyn SessionVerifier> = Arc::new(sessions);

    let router = build_router(
        AppState::new(inscriptions, listing, sessions),
        &CorsConfig {
            allow_origin: options.allow_origin,
        },
    );

    TestApp {
        store,
        cache,
        clock,
        router,
    }
}

/// Scenario fixture: `U` owns confirmed `I42` for `E7`, which has 5 participants.
pub fn seeded() -> TestApp {
    let app = app();
    seed(&app, 5);
    app
}

pub fn seed(app: &TestApp, participants: u32) {
    app.store
        .put_event(event("E7", "Encuentro Nacional", participants));
    app.store
        .put_inscription(inscription("I42", "U", "E7", InscriptionStatus::Confirmed));
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is JSON")
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Counter of `event_id` as reported by the public listing for `query`.
    pub async fn listed_participants(&self, query: &str, event_id: &str) -> Option<u64> {
        let response = self.get(&format!("/api/eventos{query}"), None).await;
        assert_eq!(response.status, StatusCode::OK, "listing {query} failed");
        response.body["data"]["events"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["id"] == event_id)
            .map(|e| e["currentParticipants"].as_u64().unwrap())
    }
}
