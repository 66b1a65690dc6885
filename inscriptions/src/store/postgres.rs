//! `PostgreSQL` registration store.
//!
//! Counter updates are single statements:
//!
//! ```sql
//! UPDATE eventos SET current_participants = GREATEST(current_participants - 1, 0) ...
//! UPDATE eventos SET current_participants = current_participants + 1
//!  WHERE ... (max_participants IS NULL OR current_participants < max_participants)
//! ```
//!
//! Cancellation (delete + release) and registration (claim + insert) each run
//! in one transaction, so a failure in either statement applies nothing. A
//! partial unique index rejects a second active inscription for the same user
//! and event even when two requests race past the service-level check.

use super::{CancelOutcome, CancelWriteError, RegistrationStore};
use crate::error::StoreError;
use crate::types::{
    Event, EventId, Inscription, InscriptionId, InscriptionStatus, ListingPage, ListingQuery,
    UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::time::Duration;

/// Postgres error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

const EVENT_COLUMNS: &str = "id, title, event_type, status, registration_open, \
     current_participants, max_participants, starts_at, created_at";

const INSCRIPTION_COLUMNS: &str = "id, user_id, event_id, status, created_at";

#[derive(Debug, FromRow)]
struct EventRow {
    id: String,
    title: String,
    event_type: String,
    status: String,
    registration_open: bool,
    current_participants: i32,
    max_participants: Option<i32>,
    starts_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            title: row.title,
            event_type: row.event_type.parse()?,
            status: row.status.parse()?,
            registration_open: row.registration_open,
            current_participants: count(row.current_participants),
            max_participants: row.max_participants.map(count),
            starts_at: row.starts_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct InscriptionRow {
    id: String,
    user_id: String,
    event_id: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<InscriptionRow> for Inscription {
    type Error = StoreError;

    fn try_from(row: InscriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            event_id: row.event_id.into(),
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

/// The schema keeps counters non-negative; a negative value reads as zero.
fn count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ListingQuery) {
    builder.push(" WHERE TRUE");
    if let Some(status) = query.status.event_status() {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let crate::types::TypeFilter::Only(event_type) = query.event_type {
        builder.push(" AND event_type = ").push_bind(event_type.as_str());
    }
    if let Some(term) = &query.search {
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        builder
            .push(" AND title ILIKE ")
            .push_bind(format!("%{escaped}%"));
    }
}

/// Registration store backed by a Postgres pool.
#[derive(Clone, Debug)]
pub struct PostgresRegistrationStore {
    pool: PgPool,
}

impl PostgresRegistrationStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database is unreachable.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Access the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert or replace an event row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn upsert_event(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO eventos (id, title, event_type, status, registration_open,
                                  current_participants, max_participants, starts_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 event_type = EXCLUDED.event_type,
                 status = EXCLUDED.status,
                 registration_open = EXCLUDED.registration_open,
                 current_participants = EXCLUDED.current_participants,
                 max_participants = EXCLUDED.max_participants,
                 starts_at = EXCLUDED.starts_at",
        )
        .bind(event.id.as_str())
        .bind(&event.title)
        .bind(event.event_type.as_str())
        .bind(event.status.as_str())
        .bind(event.registration_open)
        .bind(i32::try_from(event.current_participants).unwrap_or(i32::MAX))
        .bind(
            event
                .max_participants
                .map(|max| i32::try_from(max).unwrap_or(i32::MAX)),
        )
        .bind(event.starts_at)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RegistrationStore for PostgresRegistrationStore {
    async fn find_inscription(
        &self,
        id: &InscriptionId,
    ) -> Result<Option<Inscription>, StoreError> {
        let row: Option<InscriptionRow> = sqlx::query_as(&format!(
            "SELECT {INSCRIPTION_COLUMNS} FROM inscriptions WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Inscription::try_from).transpose()
    }

    async fn list_user_inscriptions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Inscription>, StoreError> {
        let rows: Vec<InscriptionRow> = sqlx::query_as(&format!(
            "SELECT {INSCRIPTION_COLUMNS} FROM inscriptions
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Inscription::try_from).collect()
    }

    async fn find_active_inscription(
        &self,
        user_id: &UserId,
        event_id: &EventId,
    ) -> Result<Option<Inscription>, StoreError> {
        let row: Option<InscriptionRow> = sqlx::query_as(&format!(
            "SELECT {INSCRIPTION_COLUMNS} FROM inscriptions
             WHERE user_id = $1 AND event_id = $2 AND status <> 'cancelled'
             LIMIT 1"
        ))
        .bind(user_id.as_str())
        .bind(event_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Inscription::try_from).transpose()
    }

    async fn find_event(&self, id: &EventId) -> Result<Option<Event>, StoreError> {
        let row: Option<EventRow> =
            sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM eventos WHERE id = $1"))
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        row.map(Event::try_from).transpose()
    }

    async fn list_events(&self, query: &ListingQuery) -> Result<ListingPage, StoreError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM eventos");
        push_filters(&mut count_query, query);
        let (total,): (i64,) = count_query.build_query_as().fetch_one(&self.pool).await?;

        let mut page_query =
            QueryBuilder::<Postgres>::new(format!("SELECT {EVENT_COLUMNS} FROM eventos"));
        push_filters(&mut page_query, query);
        page_query
            .push(" ORDER BY starts_at ASC, id ASC LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));
        let rows: Vec<EventRow> = page_query.build_query_as().fetch_all(&self.pool).await?;

        Ok(ListingPage {
            events: rows
                .into_iter()
                .map(Event::try_from)
                .collect::<Result<_, _>>()?,
            page: query.page,
            limit: query.limit,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn insert_inscription(&self, inscription: &Inscription) -> Result<(), StoreError> {
        insert_inscription(&mut *self.pool.acquire().await?, inscription).await
    }

    async fn delete_inscription(&self, id: &InscriptionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM inscriptions WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn release_seat(&self, event_id: &EventId) -> Result<Option<u32>, StoreError> {
        release_seat(&mut *self.pool.acquire().await?, event_id).await
    }

    async fn claim_seat(&self, event_id: &EventId) -> Result<Option<u32>, StoreError> {
        claim_seat(&mut *self.pool.acquire().await?, event_id).await
    }

    #[tracing::instrument(skip_all, fields(inscription_id = %inscription.id))]
    async fn cancel_inscription(
        &self,
        inscription: &Inscription,
    ) -> Result<CancelOutcome, CancelWriteError> {
        let not_applied = |e: sqlx::Error| CancelWriteError::NotApplied(StoreError::Database(e));

        let mut tx = self.pool.begin().await.map_err(not_applied)?;

        // The deleted row's own status decides whether a seat is released.
        let deleted: Option<(String,)> =
            sqlx::query_as("DELETE FROM inscriptions WHERE id = $1 RETURNING status")
                .bind(inscription.id.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(not_applied)?;

        let Some((status,)) = deleted else {
            return Err(CancelWriteError::Gone);
        };
        let status: InscriptionStatus = status
            .parse()
            .map_err(|e| CancelWriteError::NotApplied(StoreError::Corrupt(e)))?;

        let current_participants = if status.holds_seat() {
            release_seat(&mut tx, &inscription.event_id)
                .await
                .map_err(CancelWriteError::NotApplied)?
        } else {
            None
        };

        tx.commit().await.map_err(not_applied)?;

        Ok(CancelOutcome {
            current_participants,
        })
    }

    #[tracing::instrument(skip_all, fields(user_id = %user_id, event_id = %event_id))]
    async fn register(
        &self,
        id: InscriptionId,
        user_id: &UserId,
        event_id: &EventId,
        created_at: DateTime<Utc>,
    ) -> Result<Inscription, StoreError> {
        let mut tx = self.pool.begin().await?;

        let claimed = claim_seat(&mut tx, event_id).await?.is_some();
        let inscription = Inscription {
            id,
            user_id: user_id.clone(),
            event_id: event_id.clone(),
            status: if claimed {
                InscriptionStatus::Confirmed
            } else {
                InscriptionStatus::Waitlist
            },
            created_at,
        };
        insert_inscription(&mut tx, &inscription).await?;

        tx.commit().await?;
        Ok(inscription)
    }
}

async fn insert_inscription(
    conn: &mut sqlx::PgConnection,
    inscription: &Inscription,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO inscriptions (id, user_id, event_id, status, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(inscription.id.as_str())
    .bind(inscription.user_id.as_str())
    .bind(inscription.event_id.as_str())
    .bind(inscription.status.as_str())
    .bind(inscription.created_at)
    .execute(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::DuplicateActive(inscription.event_id.clone())
        } else {
            StoreError::Database(e)
        }
    })?;
    Ok(())
}

async fn release_seat(
    conn: &mut sqlx::PgConnection,
    event_id: &EventId,
) -> Result<Option<u32>, StoreError> {
    let row: Option<(i32,)> = sqlx::query_as(
        "UPDATE eventos
         SET current_participants = GREATEST(current_participants - 1, 0)
         WHERE id = $1
         RETURNING current_participants",
    )
    .bind(event_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(n,)| count(n)))
}

async fn claim_seat(
    conn: &mut sqlx::PgConnection,
    event_id: &EventId,
) -> Result<Option<u32>, StoreError> {
    let row: Option<(i32,)> = sqlx::query_as(
        "UPDATE eventos
         SET current_participants = current_participants + 1
         WHERE id = $1
           AND (max_participants IS NULL OR current_participants < max_participants)
         RETURNING current_participants",
    )
    .bind(event_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(n,)| count(n)))
}
