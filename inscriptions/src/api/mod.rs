//! HTTP API endpoints.
//!
//! - `events`: public event listing and detail (`/api/eventos`)
//! - `inscriptions`: a member's own inscriptions (`/api/inscripciones`)
//!
//! Every response uses the `aca_web` JSON envelope.

pub mod events;
pub mod inscriptions;
