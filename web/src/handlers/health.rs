//! Liveness endpoint.
//!
//! Used by load balancers to check that the process answers. It does not
//! touch Postgres or Redis.

use axum::Json;
use serde::Serialize;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Always `"ok"` when the process answers
    pub status: &'static str,
    /// Crate version of the serving binary
    pub version: &'static str,
}

/// Liveness check.
///
/// ```text
/// GET /health -> 200 {"status": "ok", "version": "0.1.0"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let Json(health) = health_check().await;
        assert_eq!(health.status, "ok");
        assert!(!health.version.is_empty());
    }
}
