//! Client-side registration mirror.
//!
//! A member's browser keeps a local copy of the events it shows and of the
//! member's inscriptions. The copy is maintained by [`EventsReducer`]:
//! commands such as [`EventsAction::Cancel`] issue one network call as an
//! effect, and the local state only changes when the matching result action
//! arrives. A failed call leaves the collections untouched and records the
//! error.
//!
//! [`RegistrationMirror`] runs the reducer in an [`aca_runtime::Store`] and
//! offers request/response methods on top of it.

pub mod action;
pub mod api;
pub mod mirror;
pub mod reducer;
pub mod state;

pub use action::{EventsAction, RequestId};
pub use api::{ApiError, HttpInscriptionsApi, InscriptionsApi};
pub use mirror::{MirrorError, RegistrationMirror};
pub use reducer::{EventsEnvironment, EventsReducer};
pub use state::EventsState;
