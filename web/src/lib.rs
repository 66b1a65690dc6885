//! Axum integration shared by the ACA Chile HTTP services.
//!
//! Handlers stay thin: they extract the caller and the request, call a
//! service, and map the outcome to the JSON envelope every client of the
//! association's API expects:
//!
//! ```text
//! 200 {"success": true,  "data": …}        200 {"success": true, "message": …}
//! 4xx {"success": false, "error": …, "code": …}
//! ```
//!
//! # Layers
//!
//! ```ignore
//! use aca_web::{cors::{CorsConfig, cors_layer}, middleware::request_context_layer};
//!
//! let app = Router::new()
//!     .route("/api/inscripciones/:id", delete(cancel_inscription))
//!     .layer(request_context_layer())
//!     .layer(cors_layer(&CorsConfig::default()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cors;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{BearerToken, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, request_context_layer};

use axum::Json;
use serde::Serialize;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Successful response carrying data: `{"success": true, "data": …}`.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    /// Always `true`
    pub success: bool,
    /// Payload
    pub data: T,
}

/// Successful response carrying only a message: `{"success": true, "message": …}`.
#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    /// Always `true`
    pub success: bool,
    /// Human-readable confirmation
    pub message: String,
}

/// Confirmation that also reports the resulting state:
/// `{"success": true, "message": …, "data": …}`.
#[derive(Debug, Serialize)]
pub struct MessageDataEnvelope<T> {
    /// Always `true`
    pub success: bool,
    /// Human-readable confirmation
    pub message: String,
    /// Resulting state
    pub data: T,
}

/// Wrap `data` in a success envelope.
pub fn data<T: Serialize>(data: T) -> Json<DataEnvelope<T>> {
    Json(DataEnvelope {
        success: true,
        data,
    })
}

/// Build a success envelope with a message.
pub fn message(message: impl Into<String>) -> Json<MessageEnvelope> {
    Json(MessageEnvelope {
        success: true,
        message: message.into(),
    })
}

/// Build a success envelope with a message and the resulting state.
pub fn message_with_data<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> Json<MessageDataEnvelope<T>> {
    Json(MessageDataEnvelope {
        success: true,
        message: message.into(),
        data,
    })
}
