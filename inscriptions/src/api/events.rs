//! Public event endpoints.
//!
//! - GET /api/eventos - One page of the listing (cached)
//! - GET /api/eventos/:id - One event

use crate::error::InscriptionError;
use crate::server::state::AppState;
use crate::types::{Event, EventId, ListingPage, ListingQuery, TypeFilter};
use aca_web::{AppError, DataEnvelope, WebResult};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::str::FromStr;

/// Query parameters of the event listing. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    /// `published` (default), `draft` or `all`
    pub status: Option<String>,
    /// `all` (default), `encuentro`, `taller` or `webinar`
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Free-text title search
    pub search: Option<String>,
    /// 1-based page number
    pub page: Option<String>,
    /// Page size
    pub limit: Option<String>,
}

impl ListingParams {
    /// Build the listing query; paging is clamped later.
    ///
    /// # Errors
    ///
    /// Returns a 400 [`AppError`] naming the first unparseable parameter.
    pub fn into_query(self) -> Result<ListingQuery, AppError> {
        let defaults = ListingQuery::default();
        Ok(ListingQuery {
            status: parse_param("status", self.status)?.unwrap_or(defaults.status),
            event_type: parse_param::<TypeFilter>("type", self.event_type)?
                .unwrap_or(defaults.event_type),
            search: self.search,
            page: parse_param("page", self.page)?.unwrap_or(defaults.page),
            limit: parse_param("limit", self.limit)?.unwrap_or(defaults.limit),
        })
    }
}

fn parse_param<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>, AppError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::bad_request(format!("Invalid value for '{name}': {raw}"))),
    }
}

/// List events.
///
/// # Example
///
/// ```bash
/// curl "http://localhost:8080/api/eventos?type=taller&page=2"
/// ```
///
/// # Errors
///
/// 400 on an unknown filter value, 500 when the store fails.
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListingParams>,
) -> WebResult<Json<DataEnvelope<ListingPage>>> {
    let query = params.into_query()?;
    let page = state
        .listing
        .list(query)
        .await
        .map_err(|err| AppError::from(InscriptionError::from(err)))?;

    Ok(aca_web::data(page))
}

/// Get one event.
///
/// # Errors
///
/// 404 when the event does not exist.
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<DataEnvelope<Event>>> {
    let event = state.listing.get_event(&EventId::from(id)).await?;
    Ok(aca_web::data(event))
}
