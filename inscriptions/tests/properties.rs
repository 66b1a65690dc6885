//! Property tests for the cancellation lifecycle.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use aca_inscriptions::auth::AuthenticatedUser;
use aca_inscriptions::cache::{CacheInvalidator, InMemoryListingCache};
use aca_inscriptions::store::InMemoryRegistrationStore;
use aca_inscriptions::types::{Event, EventStatus, EventType, Inscription, InscriptionStatus};
use aca_inscriptions::{CancellationPolicy, InscriptionError, InscriptionService};
use aca_testing::{test_clock, test_epoch};
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
}

fn service(store: &Arc<InMemoryRegistrationStore>, policy: CancellationPolicy) -> InscriptionService {
    let clock = Arc::new(test_clock());
    let cache = Arc::new(InMemoryListingCache::new(clock.clone()));
    InscriptionService::new(
        store.clone(),
        CacheInvalidator::new(cache, true),
        policy,
        clock,
    )
}

fn event(participants: u32) -> Event {
    Event {
        id: "E7".into(),
        title: "Encuentro Nacional".into(),
        event_type: EventType::Encuentro,
        status: EventStatus::Published,
        registration_open: true,
        current_participants: participants,
        max_participants: None,
        starts_at: test_epoch(),
        created_at: test_epoch(),
    }
}

fn status() -> impl Strategy<Value = InscriptionStatus> {
    prop_oneof![
        Just(InscriptionStatus::Confirmed),
        Just(InscriptionStatus::Waitlist),
        Just(InscriptionStatus::Cancelled),
    ]
}

proptest! {
    /// Someone other than the owner never changes the store.
    #[test]
    fn non_owner_cancel_writes_nothing(
        owner in "[a-z0-9]{1,12}",
        requester in "[a-z0-9]{1,12}",
        participants in 0u32..100,
        status in status(),
    ) {
        prop_assume!(owner != requester);

        let store = Arc::new(InMemoryRegistrationStore::new());
        store.put_event(event(participants));
        store.put_inscription(Inscription {
            id: "I42".into(),
            user_id: owner.as_str().into(),
            event_id: "E7".into(),
            status,
            created_at: test_epoch(),
        });
        let before = store.snapshot();
        let service = service(&store, CancellationPolicy::OwnerOnly);

        let result = runtime().block_on(
            service.cancel(&"I42".into(), &AuthenticatedUser::member(requester.as_str())),
        );

        prop_assert!(matches!(result, Err(InscriptionError::Unauthorized(_))));
        prop_assert_eq!(store.snapshot(), before);
    }

    /// Cancelling never drives the counter below zero, and releases exactly
    /// one seat for a confirmed inscription.
    #[test]
    fn counter_is_floored(participants in 0u32..3, status in status()) {
        prop_assume!(status != InscriptionStatus::Cancelled);

        let store = Arc::new(InMemoryRegistrationStore::new());
        store.put_event(event(participants));
        store.put_inscription(Inscription {
            id: "I42".into(),
            user_id: "U".into(),
            event_id: "E7".into(),
            status,
            created_at: test_epoch(),
        });
        let service = service(&store, CancellationPolicy::OwnerOnly);

        let result = runtime()
            .block_on(service.cancel(&"I42".into(), &AuthenticatedUser::member("U")));
        prop_assert!(result.is_ok());

        let expected = if status.holds_seat() {
            participants.saturating_sub(1)
        } else {
            participants
        };
        prop_assert_eq!(store.participants(&"E7".into()), Some(expected));
    }
}
