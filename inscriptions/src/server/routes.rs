//! Router configuration for the inscriptions service.

use super::state::AppState;
use crate::api::{events, inscriptions};
use aca_web::cors::{cors_layer, CorsConfig};
use aca_web::handlers::health_check;
use aca_web::request_context_layer;
use axum::{
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the complete router.
///
/// Layers, outermost first: request context (correlation id and span),
/// CORS (preflight answered here), HTTP tracing. Every response, including
/// preflights and 404s, carries the CORS headers and `X-Correlation-ID`.
pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    let api_routes = Router::new()
        // Public listing
        .route("/eventos", get(events::list_events))
        .route("/eventos/:id", get(events::get_event))
        // Member inscriptions
        .route(
            "/inscripciones",
            get(inscriptions::list_my_inscriptions).post(inscriptions::register),
        )
        .route(
            "/inscripciones/:id",
            get(inscriptions::get_inscription).delete(inscriptions::cancel_inscription),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors))
        .layer(request_context_layer())
}

