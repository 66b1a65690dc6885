//! Mirrored client state.

use crate::client::api::ApiError;
use crate::types::{Event, EventId, Inscription, InscriptionId};

/// What the client currently believes about events and its inscriptions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventsState {
    /// Last loaded listing page
    pub events: Vec<Event>,
    /// Event shown in detail
    pub current_event: Option<Event>,
    /// The member's inscriptions
    pub my_inscriptions: Vec<Inscription>,
    /// Whether any request is in flight
    pub loading: bool,
    /// Number of requests in flight
    pub in_flight: u32,
    /// Error of the last failed request, cleared by the next command
    pub error: Option<ApiError>,
}

impl EventsState {
    /// Whether the member holds an active inscription for `event_id`.
    #[must_use]
    pub fn is_registered(&self, event_id: &EventId) -> bool {
        self.my_inscriptions
            .iter()
            .any(|i| &i.event_id == event_id && i.status.is_active())
    }

    /// Look up a mirrored inscription.
    #[must_use]
    pub fn inscription(&self, inscription_id: &InscriptionId) -> Option<&Inscription> {
        self.my_inscriptions.iter().find(|i| &i.id == inscription_id)
    }

    /// Mirrored counter of `event_id`, from the detail view or the listing.
    #[must_use]
    pub fn participants(&self, event_id: &EventId) -> Option<u32> {
        self.current_event
            .iter()
            .chain(self.events.iter())
            .find(|e| &e.id == event_id)
            .map(|e| e.current_participants)
    }

    /// Apply `update` to every mirrored copy of `event_id`.
    pub(crate) fn update_event<F>(&mut self, event_id: &EventId, update: F)
    where
        F: Fn(&mut Event),
    {
        if let Some(event) = self.current_event.as_mut().filter(|e| &e.id == event_id) {
            update(event);
        }
        for event in self.events.iter_mut().filter(|e| &e.id == event_id) {
            update(event);
        }
    }

    pub(crate) fn begin_request(&mut self) {
        self.in_flight = self.in_flight.saturating_add(1);
        self.loading = true;
        self.error = None;
    }

    pub(crate) fn finish_request(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.loading = self.in_flight > 0;
    }
}
