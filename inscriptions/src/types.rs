//! Domain types for event inscriptions.
//!
//! Identifiers are opaque strings: rows imported from the association's
//! previous system carry ids such as `I42` or `E7`, new rows get UUID strings.
//! Every type serializes with camelCase field names, the shape the web client
//! reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an inscription
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InscriptionId(String);

impl InscriptionId {
    /// Creates a new random `InscriptionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InscriptionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InscriptionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Unique identifier for an event
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of an association member
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Error returned when a stored or submitted enum value is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    /// Which enum was being parsed
    pub kind: &'static str,
    /// The rejected value
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Lifecycle state of an inscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InscriptionStatus {
    /// Holds a seat
    Confirmed,
    /// Registered after the event filled up; holds no seat
    Waitlist,
    /// Cancelled (legacy rows only, cancellation deletes the row)
    Cancelled,
}

impl InscriptionStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Waitlist => "waitlist",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether an inscription in this state occupies one of the event's seats.
    #[must_use]
    pub const fn holds_seat(self) -> bool {
        matches!(self, Self::Confirmed)
    }

    /// Whether the inscription still counts as a registration.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl FromStr for InscriptionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "waitlist" => Ok(Self::Waitlist),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownVariant::new("inscription status", other)),
        }
    }
}

/// Publication state of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Not visible to members
    Draft,
    /// Listed publicly
    Published,
    /// Called off
    Cancelled,
    /// Already took place
    Completed,
}

impl EventStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for EventStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(UnknownVariant::new("event status", other)),
        }
    }
}

/// Kind of activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Member gathering
    Encuentro,
    /// Hands-on workshop
    Taller,
    /// Online session
    Webinar,
}

impl EventType {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Encuentro => "encuentro",
            Self::Taller => "taller",
            Self::Webinar => "webinar",
        }
    }
}

impl FromStr for EventType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "encuentro" => Ok(Self::Encuentro),
            "taller" => Ok(Self::Taller),
            "webinar" => Ok(Self::Webinar),
            other => Err(UnknownVariant::new("event type", other)),
        }
    }
}

/// Role attached to a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular member
    #[default]
    User,
    /// Runs events
    Organizer,
    /// Association staff
    Admin,
}

impl Role {
    /// Organizers and admins.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Organizer | Self::Admin)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A member's registration for one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inscription {
    /// Inscription id
    pub id: InscriptionId,
    /// Owner; never changes
    pub user_id: UserId,
    /// Event; never changes
    pub event_id: EventId,
    /// Current state
    pub status: InscriptionStatus,
    /// Creation time; never changes
    pub created_at: DateTime<Utc>,
}

/// A schedulable activity with a seat counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event id
    pub id: EventId,
    /// Display title
    pub title: String,
    /// Kind of activity
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Publication state
    pub status: EventStatus,
    /// Whether new inscriptions are accepted
    pub registration_open: bool,
    /// Confirmed inscriptions; never negative
    pub current_participants: u32,
    /// Seat limit, if any
    pub max_participants: Option<u32>,
    /// Start time
    pub starts_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Published with registration open.
    #[must_use]
    pub fn accepts_inscriptions(&self) -> bool {
        self.registration_open && self.status == EventStatus::Published
    }

    /// Whether one more confirmed inscription fits.
    #[must_use]
    pub fn has_free_seat(&self) -> bool {
        self.max_participants
            .is_none_or(|max| self.current_participants < max)
    }
}

// ============================================================================
// Listing
// ============================================================================

/// Default page size of the public event listing.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Status filter of the event listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    /// Published events only
    #[default]
    Published,
    /// Drafts only
    Draft,
    /// Any status
    All,
}

impl StatusFilter {
    /// Every filter value, in key order.
    pub const ALL: [Self; 3] = [Self::Published, Self::Draft, Self::All];

    /// Query and cache-key representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Draft => "draft",
            Self::All => "all",
        }
    }

    /// The event status this filter selects, `None` for every status.
    #[must_use]
    pub const fn event_status(self) -> Option<EventStatus> {
        match self {
            Self::Published => Some(EventStatus::Published),
            Self::Draft => Some(EventStatus::Draft),
            Self::All => None,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(Self::Published),
            "draft" => Ok(Self::Draft),
            "all" => Ok(Self::All),
            other => Err(UnknownVariant::new("status filter", other)),
        }
    }
}

/// Type filter of the event listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TypeFilter {
    /// Any type
    #[default]
    All,
    /// One event type
    Only(EventType),
}

impl TypeFilter {
    /// Every filter value, in key order.
    pub const ALL: [Self; 4] = [
        Self::All,
        Self::Only(EventType::Encuentro),
        Self::Only(EventType::Taller),
        Self::Only(EventType::Webinar),
    ];

    /// Query and cache-key representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(event_type) => event_type.as_str(),
        }
    }
}

impl FromStr for TypeFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Self::All);
        }
        s.parse::<EventType>()
            .map(Self::Only)
            .map_err(|_| UnknownVariant::new("type filter", s))
    }
}

/// One page request against the event listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingQuery {
    /// Status filter
    pub status: StatusFilter,
    /// Type filter
    pub event_type: TypeFilter,
    /// Free-text title search; `None` when absent or blank
    pub search: Option<String>,
    /// 1-based page number
    pub page: u32,
    /// Page size, `1..=MAX_PAGE_SIZE`
    pub limit: u32,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            status: StatusFilter::default(),
            event_type: TypeFilter::default(),
            search: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListingQuery {
    /// Clamp paging into range and canonicalize the search term.
    ///
    /// Search terms are trimmed and lowercased so that equivalent requests
    /// share one cache entry; a blank term means no search.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self.search = self
            .search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        self
    }

    /// Rows to skip before this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Whether `event` passes the status, type and search filters.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let status_ok = self
            .status
            .event_status()
            .is_none_or(|status| status == event.status);
        let type_ok = match self.event_type {
            TypeFilter::All => true,
            TypeFilter::Only(t) => t == event.event_type,
        };
        let search_ok = self
            .search
            .as_deref()
            .is_none_or(|term| event.title.to_lowercase().contains(term));
        status_ok && type_ok && search_ok
    }
}

/// One page of the event listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    /// Events on this page, ordered by start time
    pub events: Vec<Event>,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Events matching the filters across all pages
    pub total: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(title: &str, status: EventStatus, event_type: EventType) -> Event {
        Event {
            id: EventId::from("E1"),
            title: title.to_string(),
            event_type,
            status,
            registration_open: true,
            current_participants: 0,
            max_participants: None,
            starts_at: DateTime::UNIX_EPOCH,
            created_at: DateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn serializes_camel_case_and_type_field() {
        let e = event("Asado de invierno", EventStatus::Published, EventType::Encuentro);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "encuentro");
        assert_eq!(json["currentParticipants"], 0);
        assert_eq!(json["registrationOpen"], true);
    }

    #[test]
    fn only_confirmed_holds_a_seat() {
        assert!(InscriptionStatus::Confirmed.holds_seat());
        assert!(!InscriptionStatus::Waitlist.holds_seat());
        assert!(!InscriptionStatus::Cancelled.is_active());
    }

    #[test]
    fn filters_parse_from_query_values() {
        assert_eq!("all".parse::<TypeFilter>(), Ok(TypeFilter::All));
        assert_eq!(
            "taller".parse::<TypeFilter>(),
            Ok(TypeFilter::Only(EventType::Taller))
        );
        assert!("cumpleanos".parse::<TypeFilter>().is_err());
        assert_eq!("draft".parse::<StatusFilter>(), Ok(StatusFilter::Draft));
    }

    #[test]
    fn normalization_clamps_paging_and_search() {
        let query = ListingQuery {
            search: Some("  Asado ".to_string()),
            page: 0,
            limit: 500,
            ..ListingQuery::default()
        }
        .normalized();

        assert_eq!(query.page, 1);
        assert_eq!(query.limit, MAX_PAGE_SIZE);
        assert_eq!(query.search.as_deref(), Some("asado"));

        let blank = ListingQuery {
            search: Some("   ".to_string()),
            ..ListingQuery::default()
        }
        .normalized();
        assert_eq!(blank.search, None);
    }

    #[test]
    fn query_matches_filters() {
        let e = event("Taller de Parrilla", EventStatus::Draft, EventType::Taller);
        let mut query = ListingQuery::default();
        assert!(!query.matches(&e));

        query.status = StatusFilter::All;
        query.search = Some("parrilla".to_string());
        assert!(query.matches(&e));

        query.event_type = TypeFilter::Only(EventType::Webinar);
        assert!(!query.matches(&e));
    }

    #[test]
    fn seat_availability_respects_limit() {
        let mut e = event("Asado", EventStatus::Published, EventType::Encuentro);
        assert!(e.has_free_seat());
        e.max_participants = Some(2);
        e.current_participants = 2;
        assert!(!e.has_free_seat());
        assert!(e.accepts_inscriptions());
    }
}
