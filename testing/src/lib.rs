//! # ACA Testing
//!
//! Test support shared by the ACA Chile crates:
//!
//! - [`ReducerTest`]: Given/When/Then harness for reducers
//! - [`assertions`]: checks on the effects a reducer returned
//! - [`FixedClock`] and [`ManualClock`]: deterministic time for timestamps
//!   and cache expiry
//!
//! ## Example
//!
//! ```ignore
//! use aca_testing::ReducerTest;
//!
//! ReducerTest::new(EventsReducer::new())
//!     .with_env(env)
//!     .given_state(EventsState::default())
//!     .when_action(EventsAction::Cancelled { .. })
//!     .then_state(|state| assert!(state.my_inscriptions.is_empty()))
//!     .run();
//! ```


pub use reducer_test::{ReducerTest, assertions};

use aca_core::environment::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Clock frozen at a single instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Clock that only moves when a test advances it.
///
/// Used to step past cache TTLs without sleeping.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock starting at `time`.
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut time = self
            .time
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *time += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .time
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// The instant every test clock starts at: 2025-01-01 00:00:00 UTC.
#[must_use]
pub fn test_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_735_689_600)
}

/// A [`FixedClock`] at [`test_epoch`].
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(test_epoch())
}
