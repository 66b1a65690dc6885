//! ACA Chile event inscriptions.
//!
//! Members of the association register for encuentros, talleres and webinars
//! and may cancel those registrations. This crate owns that lifecycle:
//!
//! - **Store**: inscriptions and events, with the `currentParticipants` seat
//!   counter kept consistent with the confirmed inscriptions
//! - **Listing**: the public event listing, served through a tagged TTL cache
//! - **Lifecycle**: cancel, inscribe and read operations for authenticated
//!   members
//! - **Client mirror**: a reducer-driven copy of the member's view that only
//!   changes once the server has confirmed a change
//!
//! # Architecture
//!
//! ```text
//!   HTTP (axum) ──▶ InscriptionService ──▶ RegistrationStore (Postgres)
//!        │                 │
//!        │                 └──────────▶ CacheInvalidator ──▶ ListingCache (Redis)
//!        │                                                        ▲
//!        └────────▶ EventListingService ─── read-through ─────────┘
//! ```
//!
//! # Cancellation
//!
//! A cancel deletes the inscription and releases its seat in one
//! transaction, then invalidates every cached listing page that showed the
//! event. A retry after success sees `NotFound`, so the counter is never
//! released twice. See [`lifecycle`].

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod listing;
pub mod metrics;
pub mod server;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{InscriptionError, StoreError};
pub use lifecycle::{Cancellation, CancellationPolicy, InscriptionService};
pub use listing::EventListingService;
pub use types::{Event, EventId, Inscription, InscriptionId, InscriptionStatus, UserId};
