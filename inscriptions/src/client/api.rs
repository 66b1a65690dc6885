//! Network client used by the registration mirror.

use crate::lifecycle::Cancellation;
use crate::types::{Event, EventId, Inscription, InscriptionId, ListingPage, ListingQuery};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Failure of a call to the inscriptions API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with an error envelope
    #[error("{message} ({code})")]
    Server {
        /// HTTP status
        status: u16,
        /// Machine-readable error code
        code: String,
        /// Human-readable message
        message: String,
    },

    /// The request did not complete
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be decoded
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The base URL cannot carry an API path
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether the server reported the resource as missing.
    ///
    /// After a cancel this is the terminal state: a retry of a cancel that
    /// already succeeded lands here.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Server { status: 404, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// The HTTP surface the mirror talks to.
#[async_trait]
pub trait InscriptionsApi: Send + Sync {
    /// `GET /api/eventos`
    async fn list_events(&self, query: &ListingQuery) -> Result<ListingPage, ApiError>;

    /// `GET /api/eventos/:id`
    async fn get_event(&self, event_id: &EventId) -> Result<Event, ApiError>;

    /// `GET /api/inscripciones`
    async fn my_inscriptions(&self) -> Result<Vec<Inscription>, ApiError>;

    /// `POST /api/inscripciones`
    async fn register(&self, event_id: &EventId) -> Result<Inscription, ApiError>;

    /// `DELETE /api/inscripciones/:id`
    async fn cancel(&self, inscription_id: &InscriptionId) -> Result<Cancellation, ApiError>;
}

#[derive(Deserialize)]
struct DataBody<T> {
    data: T,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: String,
}

/// [`InscriptionsApi`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpInscriptionsApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpInscriptionsApi {
    /// Client for the API at `base_url` (for example `https://acachile.cl`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Send `token` as the bearer session on every call.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Base URL extended with `segments`, each percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            return Err(ApiError::Server {
                status: status.as_u16(),
                code: body.code,
                message: body.error,
            });
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body: DataBody<T> = self.send(request).await?.json().await?;
        Ok(body.data)
    }
}

#[async_trait]
impl InscriptionsApi for HttpInscriptionsApi {
    async fn list_events(&self, query: &ListingQuery) -> Result<ListingPage, ApiError> {
        let mut params = vec![
            ("status", query.status.as_str().to_string()),
            ("type", query.event_type.as_str().to_string()),
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }
        let request = self.client.get(self.url(&["api", "eventos"])?).query(&params);
        self.fetch(request).await
    }

    async fn get_event(&self, event_id: &EventId) -> Result<Event, ApiError> {
        let request = self
            .client
            .get(self.url(&["api", "eventos", event_id.as_str()])?);
        self.fetch(request).await
    }

    async fn my_inscriptions(&self) -> Result<Vec<Inscription>, ApiError> {
        self.fetch(self.client.get(self.url(&["api", "inscripciones"])?))
            .await
    }

    async fn register(&self, event_id: &EventId) -> Result<Inscription, ApiError> {
        let request = self
            .client
            .post(self.url(&["api", "inscripciones"])?)
            .json(&serde_json::json!({ "eventId": event_id }));
        self.fetch(request).await
    }

    async fn cancel(&self, inscription_id: &InscriptionId) -> Result<Cancellation, ApiError> {
        let request = self
            .client
            .delete(self.url(&["api", "inscripciones", inscription_id.as_str()])?);
        self.fetch(request).await
    }
}
