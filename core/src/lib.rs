//! # ACA Core
//!
//! Shared abstractions for the ACA Chile services.
//!
//! Business rules that react to user intent are written as reducers:
//!
//! - **State**: the data a feature owns (for example the client's mirror of
//!   events and inscriptions)
//! - **Action**: every input the feature reacts to, both commands
//!   (`Cancel { inscription_id }`) and results (`Cancelled { .. }`)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a description of I/O to perform, executed by the runtime
//! - **Environment**: injected dependencies (API clients, clocks)
//!
//! Reducers never perform I/O themselves. A network call is returned as an
//! [`effect::Effect::Future`] whose output action is fed back into the reducer,
//! so local state only changes once the call has resolved.
//!
//! ## Example
//!
//! ```ignore
//! use aca_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for SeatReducer {
//!     type State = SeatState;
//!     type Action = SeatAction;
//!     type Environment = SeatEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut SeatState,
//!         action: SeatAction,
//!         env: &SeatEnvironment,
//!     ) -> SmallVec<[Effect<SeatAction>; 4]> {
//!         match action {
//!             SeatAction::Release => {
//!                 state.taken = state.taken.saturating_sub(1);
//!                 SmallVec::new()
//!             }
//!         }
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

/// The reducer trait.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// Pure business logic: applies an action to state and describes the
    /// side effects that should follow.
    ///
    /// # Type Parameters
    ///
    /// - `State`: the state this reducer mutates
    /// - `Action`: commands and results it processes
    /// - `Environment`: injected dependencies captured by effects
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects.
        ///
        /// Implementations validate the action, update `state` in place and
        /// return effect descriptions for the runtime to execute. Most
        /// reducers return zero to two effects, hence the inline capacity.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Side effect descriptions.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// A side effect returned by a reducer.
    ///
    /// Effects are values. The runtime decides when and where they run; the
    /// reducer only describes them.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Run effects one after another
        Sequential(Vec<Effect<Action>>),

        /// Dispatch an action after a delay
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after the delay
            action: Box<Action>,
        },

        /// Arbitrary async computation (network calls).
        ///
        /// If it resolves to `Some(action)`, the action is fed back into the
        /// reducer.
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wrap an async computation that always produces a follow-up action.
        #[must_use]
        pub fn task<F>(future: F) -> Self
        where
            F: Future<Output = Action> + Send + 'static,
        {
            Effect::Future(Box::pin(async move { Some(future.await) }))
        }

        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Whether this effect does nothing.
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }
}

/// Injected dependencies shared by every environment.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Source of the current time.
    ///
    /// Production code uses [`SystemClock`]; tests inject a fixed or manually
    /// advanced clock so timestamps and cache expiry are deterministic.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
