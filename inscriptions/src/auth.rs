//! Session authentication.
//!
//! A bearer token resolves to an [`AuthenticatedUser`] through a
//! [`SessionVerifier`]. In production sessions live in Redis under
//! `session:{token}` as JSON `{"userId": .., "role": ..}`, written by the
//! login flow. Handlers take a [`SessionUser`] argument; a request without a
//! valid session is rejected with 401 before the handler body runs.

use crate::error::AuthError;
use crate::types::{Role, UserId};
use aca_web::{AppError, BearerToken};
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Identity attached to a valid session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    /// Member id
    pub user_id: UserId,
    /// Role, `user` when absent
    #[serde(default)]
    pub role: Role,
}

impl AuthenticatedUser {
    /// Regular member.
    #[must_use]
    pub fn member(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::User,
        }
    }
}

/// Resolves bearer tokens to users.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// Look up the session for `token`.
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// Sessions stored in Redis.
#[derive(Clone)]
pub struct RedisSessionVerifier {
    conn_manager: ConnectionManager,
}

impl RedisSessionVerifier {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Backend`] if Redis is unreachable.
    pub async fn connect(redis_url: &str) -> Result<Self, AuthError> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;
        Ok(Self { conn_manager })
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn new(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn session_key(token: &str) -> String {
        format!("session:{token}")
    }
}

#[async_trait]
impl SessionVerifier for RedisSessionVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let mut conn = self.conn_manager.clone();
        let payload: Option<String> = conn.get(Self::session_key(token)).await?;
        let payload = payload.ok_or(AuthError::InvalidSession)?;
        Ok(serde_json::from_str(&payload)?)
    }
}

/// Sessions held in process memory, for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemorySessionVerifier {
    sessions: RwLock<HashMap<String, AuthenticatedUser>>,
}

impl InMemorySessionVerifier {
    /// Create a verifier with no sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`InMemorySessionVerifier::insert`].
    #[must_use]
    pub fn with_session(self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.insert(token, user);
        self
    }

    /// Register a session.
    pub fn insert(&self, token: impl Into<String>, user: AuthenticatedUser) {
        self.sessions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(token.into(), user);
    }
}

#[async_trait]
impl SessionVerifier for InMemorySessionVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.sessions
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidSession)
    }
}

/// Extractor for the authenticated caller.
#[derive(Debug, Clone)]
pub struct SessionUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    Arc<dyn SessionVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let verifier = Arc::<dyn SessionVerifier>::from_ref(state);

        let user = verifier.verify(&token).await.map_err(|err| {
            tracing::debug!(error = %err, "Session rejected");
            AppError::from(err)
        })?;

        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_verifier_resolves_known_tokens() {
        let verifier =
            InMemorySessionVerifier::new().with_session("tok-u", AuthenticatedUser::member("U"));

        let user = verifier.verify("tok-u").await.unwrap();
        assert_eq!(user.user_id, UserId::from("U"));
        assert!(matches!(
            verifier.verify("tok-x").await,
            Err(AuthError::InvalidSession)
        ));
    }

    #[test]
    fn session_payload_defaults_role() {
        let user: AuthenticatedUser = serde_json::from_str(r#"{"userId":"U1"}"#).unwrap();
        assert_eq!(user.role, Role::User);

        let admin: AuthenticatedUser =
            serde_json::from_str(r#"{"userId":"A1","role":"admin"}"#).unwrap();
        assert!(admin.role.is_staff());
    }
}
