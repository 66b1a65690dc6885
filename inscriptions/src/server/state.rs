//! Application state for the inscriptions HTTP server.

use crate::auth::SessionVerifier;
use crate::lifecycle::InscriptionService;
use crate::listing::EventListingService;
use axum::extract::FromRef;
use std::sync::Arc;

/// Dependencies shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Cancel, inscribe and read inscriptions
    pub inscriptions: Arc<InscriptionService>,
    /// Public event listing
    pub listing: Arc<EventListingService>,
    /// Bearer token verification
    pub sessions: Arc<dyn SessionVerifier>,
}

impl AppState {
    /// Create the application state.
    #[must_use]
    pub fn new(
        inscriptions: InscriptionService,
        listing: EventListingService,
        sessions: Arc<dyn SessionVerifier>,
    ) -> Self {
        Self {
            inscriptions: Arc::new(inscriptions),
            listing: Arc::new(listing),
            sessions,
        }
    }
}

// Lets the `SessionUser` extractor find the verifier.
impl FromRef<AppState> for Arc<dyn SessionVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
