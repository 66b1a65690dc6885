//! # ACA Runtime
//!
//! The [`Store`] owns a reducer's state and runs the effects it returns.
//!
//! ```text
//! send(action) ─▶ reducer ─▶ effects ─▶ (network, timers)
//!      ▲                                   │
//!      └──────── result action ◀───────────┘
//! ```
//!
//! Result actions produced by effects are reduced first and then broadcast,
//! so an observer that receives a result can immediately read the state it
//! produced. [`Store::send_and_wait_for`] builds request/response calls on top
//! of that broadcast.
//!
//! ## Example
//!
//! ```ignore
//! use aca_runtime::Store;
//!
//! let store = Store::new(EventsState::default(), EventsReducer::new(), env);
//! store.send(EventsAction::LoadMyInscriptions { request_id }).await;
//! let count = store.state(|s| s.my_inscriptions.len()).await;
//! ```

use aca_core::{effect::Effect, reducer::Reducer};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors returned while waiting on the store.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// No matching action arrived before the deadline
        #[error("timed out waiting for a result action")]
        Timeout,

        /// The action broadcast channel closed
        #[error("action channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Default capacity of the result-action broadcast channel.
const BROADCAST_CAPACITY: usize = 64;

/// Runtime for a single reducer.
///
/// Cloning a store is cheap; clones share state and the broadcast channel.
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: Arc<R>,
    environment: Arc<E>,
    action_broadcast: broadcast::Sender<A>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: Arc::clone(&self.reducer),
            environment: Arc::clone(&self.environment),
            action_broadcast: self.action_broadcast.clone(),
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        let (action_broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);

        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer: Arc::new(reducer),
            environment: Arc::new(environment),
            action_broadcast,
        }
    }

    /// Reduce an action and start its effects.
    ///
    /// Returns once the reducer has run; effects continue in the background.
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub async fn send(&self, action: A) {
        metrics::counter!("aca_store_actions_total").increment(1);

        let effects = {
            let mut state = self.state.write().await;
            self.reducer.reduce(&mut state, action, &self.environment)
        };

        tracing::trace!(effects = effects.len(), "Reducer completed");
        for effect in effects {
            self.execute(effect);
        }
    }

    /// Send an action and wait for the first result action matching `predicate`.
    ///
    /// The subscription is taken before the action is sent, so a fast effect
    /// cannot slip its result past the waiter. Only actions produced by effects
    /// are observed, never the initial action.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`] if nothing matched within `timeout`
    /// - [`StoreError::ChannelClosed`] if the broadcast channel closed
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        let mut receiver = self.action_broadcast.subscribe();
        self.send(action).await;

        let wait = async {
            loop {
                match receiver.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Result waiter lagged behind the broadcast");
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Subscribe to result actions produced by effects.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.action_broadcast.subscribe()
    }

    /// Read current state via a closure.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    fn execute(&self, effect: Effect<A>) {
        match effect {
            Effect::None => {},
            Effect::Parallel(effects) => {
                for effect in effects {
                    self.execute(effect);
                }
            },
            Effect::Sequential(effects) => {
                let store = self.clone();
                tokio::spawn(async move {
                    for effect in effects {
                        store.run_to_completion(effect).await;
                    }
                });
            },
            Effect::Delay { duration, action } => {
                let store = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    store.feedback(*action).await;
                });
            },
            Effect::Future(future) => {
                let store = self.clone();
                tokio::spawn(async move {
                    if let Some(action) = future.await {
                        store.feedback(action).await;
                    }
                });
            },
        }
    }

    /// Run one effect of a sequential chain, waiting for it to finish.
    fn run_to_completion(&self, effect: Effect<A>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let store = self.clone();
        Box::pin(async move {
            match effect {
                Effect::None => {},
                Effect::Parallel(effects) => {
                    let handles: Vec<_> = effects
                        .into_iter()
                        .map(|effect| tokio::spawn(store.run_to_completion(effect)))
                        .collect();
                    for handle in handles {
                        if let Err(error) = handle.await {
                            tracing::error!(error = %error, "Parallel effect task failed");
                        }
                    }
                },
                Effect::Sequential(effects) => {
                    for effect in effects {
                        store.run_to_completion(effect).await;
                    }
                },
                Effect::Delay { duration, action } => {
                    tokio::time::sleep(duration).await;
                    store.feedback(*action).await;
                },
                Effect::Future(future) => {
                    if let Some(action) = future.await {
                        store.feedback(action).await;
                    }
                },
            }
        })
    }

    /// Reduce a result action, then publish it to observers.
    fn feedback(&self, action: A) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let store = self.clone();
        Box::pin(async move {
            store.send(action.clone()).await;
            // No receivers is the common case outside request/response calls.
            let _ = store.action_broadcast.send(action);
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use aca_core::{SmallVec, smallvec};

    #[derive(Debug, Clone, PartialEq)]
    enum SeatAction {
        Claim { request: u32 },
        Claimed { request: u32 },
        Rejected { request: u32 },
        ReleaseLater,
        Released,
    }

    #[derive(Debug, Default)]
    struct SeatState {
        taken: u32,
        capacity: u32,
    }

    struct SeatReducer;

    impl Reducer for SeatReducer {
        type State = SeatState;
        type Action = SeatAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut SeatState,
            action: SeatAction,
            _env: &(),
        ) -> SmallVec<[Effect<SeatAction>; 4]> {
            match action {
                SeatAction::Claim { request } => {
                    let available = state.taken < state.capacity;
                    smallvec![Effect::task(async move {
                        if available {
                            SeatAction::Claimed { request }
                        } else {
                            SeatAction::Rejected { request }
                        }
                    })]
                },
                SeatAction::Claimed { .. } => {
                    state.taken += 1;
                    SmallVec::new()
                },
                SeatAction::ReleaseLater => smallvec![Effect::Delay {
                    duration: Duration::from_millis(5),
                    action: Box::new(SeatAction::Released),
                }],
                SeatAction::Released => {
                    state.taken = state.taken.saturating_sub(1);
                    SmallVec::new()
                },
                SeatAction::Rejected { .. } => SmallVec::new(),
            }
        }
    }

    fn store(capacity: u32, taken: u32) -> Store<SeatState, SeatAction, (), SeatReducer> {
        Store::new(SeatState { taken, capacity }, SeatReducer, ())
    }

    #[tokio::test]
    async fn result_is_reduced_before_waiter_sees_it() {
        let store = store(2, 0);

        let result = store
            .send_and_wait_for(
                SeatAction::Claim { request: 1 },
                |a| matches!(a, SeatAction::Claimed { request: 1 } | SeatAction::Rejected { request: 1 }),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert_eq!(result, SeatAction::Claimed { request: 1 });
        assert_eq!(store.state(|s| s.taken).await, 1);
    }

    #[tokio::test]
    async fn rejected_result_leaves_state_untouched() {
        let store = store(1, 1);

        let result = store
            .send_and_wait_for(
                SeatAction::Claim { request: 9 },
                |a| matches!(a, SeatAction::Claimed { .. } | SeatAction::Rejected { .. }),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert_eq!(result, SeatAction::Rejected { request: 9 });
        assert_eq!(store.state(|s| s.taken).await, 1);
    }

    #[tokio::test]
    async fn delayed_action_is_fed_back() {
        let store = store(1, 1);

        store
            .send_and_wait_for(
                SeatAction::ReleaseLater,
                |a| matches!(a, SeatAction::Released),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert_eq!(store.state(|s| s.taken).await, 0);
    }

    #[tokio::test]
    async fn waiting_without_matching_result_times_out() {
        let store = store(1, 0);

        let result = store
            .send_and_wait_for(SeatAction::Released, |_| true, Duration::from_millis(20))
            .await;

        assert_eq!(result, Err(StoreError::Timeout));
    }
}
