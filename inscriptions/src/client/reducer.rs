//! Reducer of the registration mirror.
//!
//! Commands never touch the collections; they mark a request in flight and
//! return one network effect. Only result actions change what the member
//! sees, so the mirror never shows a cancellation the server has not
//! confirmed.

use crate::client::action::EventsAction;
use crate::client::api::InscriptionsApi;
use crate::client::state::EventsState;
use crate::lifecycle::Cancellation;
use crate::types::Inscription;
use aca_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use std::sync::Arc;

/// Dependencies of [`EventsReducer`].
#[derive(Clone)]
pub struct EventsEnvironment {
    /// Network client
    pub api: Arc<dyn InscriptionsApi>,
}

impl EventsEnvironment {
    /// Create the environment.
    #[must_use]
    pub fn new(api: Arc<dyn InscriptionsApi>) -> Self {
        Self { api }
    }
}

/// Reducer keeping [`EventsState`] in line with the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventsReducer;

impl EventsReducer {
    /// Create the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn apply_cancelled(state: &mut EventsState, cancellation: &Cancellation) {
        let removed = state
            .my_inscriptions
            .iter()
            .position(|i| i.id == cancellation.inscription_id)
            .map(|position| state.my_inscriptions.remove(position));

        match (cancellation.current_participants, removed) {
            // The server's counter wins, even for events whose inscription
            // was never mirrored.
            (Some(count), _) => state.update_event(&cancellation.event_id, |event| {
                event.current_participants = count;
            }),
            (None, Some(removed)) if removed.status.holds_seat() => {
                state.update_event(&removed.event_id, |event| {
                    event.current_participants = event.current_participants.saturating_sub(1);
                });
            },
            (None, Some(_)) => {},
            (None, None) => tracing::debug!(
                inscription_id = %cancellation.inscription_id,
                "Cancelled inscription not mirrored"
            ),
        }
    }

    fn apply_registered(state: &mut EventsState, inscription: Inscription) {
        if inscription.status.holds_seat() {
            state.update_event(&inscription.event_id, |event| {
                event.current_participants = event.current_participants.saturating_add(1);
            });
        }
        state.my_inscriptions.push(inscription);
    }

    fn request(
        state: &mut EventsState,
        effect: Effect<EventsAction>,
    ) -> SmallVec<[Effect<EventsAction>; 4]> {
        state.begin_request();
        smallvec![effect]
    }
}

impl Reducer for EventsReducer {
    type State = EventsState;
    type Action = EventsAction;
    type Environment = EventsEnvironment;

    fn reduce(
        &self,
        state: &mut EventsState,
        action: EventsAction,
        env: &EventsEnvironment,
    ) -> SmallVec<[Effect<EventsAction>; 4]> {
        match action {
            // Commands
            EventsAction::LoadEvents { request_id, query } => {
                let api = Arc::clone(&env.api);
                Self::request(
                    state,
                    Effect::task(async move {
                        match api.list_events(&query).await {
                            Ok(page) => EventsAction::EventsLoaded { request_id, page },
                            Err(error) => EventsAction::RequestFailed { request_id, error },
                        }
                    }),
                )
            },
            EventsAction::LoadEvent {
                request_id,
                event_id,
            } => {
                let api = Arc::clone(&env.api);
                Self::request(
                    state,
                    Effect::task(async move {
                        match api.get_event(&event_id).await {
                            Ok(event) => EventsAction::EventLoaded { request_id, event },
                            Err(error) => EventsAction::RequestFailed { request_id, error },
                        }
                    }),
                )
            },
            EventsAction::LoadMyInscriptions { request_id } => {
                let api = Arc::clone(&env.api);
                Self::request(
                    state,
                    Effect::task(async move {
                        match api.my_inscriptions().await {
                            Ok(inscriptions) => EventsAction::MyInscriptionsLoaded {
                                request_id,
                                inscriptions,
                            },
                            Err(error) => EventsAction::RequestFailed { request_id, error },
                        }
                    }),
                )
            },
            EventsAction::Register {
                request_id,
                event_id,
            } => {
                let api = Arc::clone(&env.api);
                Self::request(
                    state,
                    Effect::task(async move {
                        match api.register(&event_id).await {
                            Ok(inscription) => EventsAction::Registered {
                                request_id,
                                inscription,
                            },
                            Err(error) => EventsAction::RequestFailed { request_id, error },
                        }
                    }),
                )
            },
            EventsAction::Cancel {
                request_id,
                inscription_id,
            } => {
                let api = Arc::clone(&env.api);
                Self::request(
                    state,
                    Effect::task(async move {
                        match api.cancel(&inscription_id).await {
                            Ok(cancellation) => EventsAction::Cancelled {
                                request_id,
                                cancellation,
                            },
                            Err(error) => EventsAction::RequestFailed { request_id, error },
                        }
                    }),
                )
            },

            // Results
            EventsAction::EventsLoaded { page, .. } => {
                state.finish_request();
                state.events = page.events;
                SmallVec::new()
            },
            EventsAction::EventLoaded { event, .. } => {
                state.finish_request();
                state.current_event = Some(event);
                SmallVec::new()
            },
            EventsAction::MyInscriptionsLoaded { inscriptions, .. } => {
                state.finish_request();
                state.my_inscriptions = inscriptions;
                SmallVec::new()
            },
            EventsAction::Registered { inscription, .. } => {
                state.finish_request();
                Self::apply_registered(state, inscription);
                SmallVec::new()
            },
            EventsAction::Cancelled { cancellation, .. } => {
                state.finish_request();
                Self::apply_cancelled(state, &cancellation);
                SmallVec::new()
            },
            EventsAction::RequestFailed { request_id, error } => {
                state.finish_request();
                tracing::debug!(request_id, %error, "Request failed");
                state.error = Some(error);
                SmallVec::new()
            },
        }
    }
}
