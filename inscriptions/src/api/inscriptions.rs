//! Inscription endpoints. All of them require a session.
//!
//! - GET /api/inscripciones - The caller's inscriptions
//! - POST /api/inscripciones - Register for an event
//! - GET /api/inscripciones/:id - One inscription
//! - DELETE /api/inscripciones/:id - Cancel an inscription

use crate::auth::SessionUser;
use crate::lifecycle::Cancellation;
use crate::server::state::AppState;
use crate::types::{EventId, Inscription, InscriptionId};
use aca_web::{AppError, DataEnvelope, MessageDataEnvelope, WebResult};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

/// Body of a registration request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Event to register for
    pub event_id: EventId,
}

/// List the caller's inscriptions, newest first.
///
/// # Errors
///
/// 401 without a session, 500 when the store fails.
pub async fn list_my_inscriptions(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
) -> WebResult<Json<DataEnvelope<Vec<Inscription>>>> {
    let inscriptions = state.inscriptions.list_mine(&user).await?;
    Ok(aca_web::data(inscriptions))
}

/// Register the caller for an event.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/inscripciones \
///   -H "Authorization: Bearer <session_token>" \
///   -H "Content-Type: application/json" \
///   -d '{"eventId": "E7"}'
/// ```
///
/// # Errors
///
/// 400 on a malformed body, closed registration or a duplicate inscription;
/// 404 when the event does not exist.
pub async fn register(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> WebResult<(StatusCode, Json<DataEnvelope<Inscription>>)> {
    let Json(request) = body.map_err(|rejection| {
        AppError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let inscription = state
        .inscriptions
        .inscribe(&request.event_id, &user)
        .await?;

    Ok((StatusCode::CREATED, aca_web::data(inscription)))
}

/// Get one of the caller's inscriptions.
///
/// # Errors
///
/// 404 when missing, 403 when it belongs to someone else.
pub async fn get_inscription(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Path(id): Path<String>,
) -> WebResult<Json<DataEnvelope<Inscription>>> {
    let inscription = state
        .inscriptions
        .get(&InscriptionId::from(id), &user)
        .await?;
    Ok(aca_web::data(inscription))
}

/// Cancel an inscription.
///
/// The body carries the event's counter after the cancel, so a client can
/// update an event view that never listed the inscription.
///
/// # Example
///
/// ```bash
/// curl -X DELETE http://localhost:8080/api/inscripciones/I42 \
///   -H "Authorization: Bearer <session_token>"
/// ```
///
/// # Errors
///
/// - 404 when missing or already cancelled by a concurrent request
/// - 403 when it belongs to someone else
/// - 400 when the row is already marked cancelled
/// - 500 `INTERNAL_SERVER_ERROR` when nothing was applied
/// - 500 `PARTIALLY_APPLIED` when the inscription is gone but the event
///   counter was not updated
pub async fn cancel_inscription(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Path(id): Path<String>,
) -> WebResult<Json<MessageDataEnvelope<Cancellation>>> {
    let cancellation = state
        .inscriptions
        .cancel(&InscriptionId::from(id), &user)
        .await?;
    Ok(aca_web::message_with_data("Inscription cancelled", cancellation))
}
