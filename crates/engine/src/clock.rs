//! An object-safe clock handle for the executor.
//!
//! `gcluster_core::Clock` requires `Clone`, which makes it impossible to use
//! as a trait object. The executor only ever needs `epoch_ms()` through an
//! `Arc`, so this is a thin object-safe adapter over any `Clock`.

use std::sync::Arc;

use gcluster_core::Clock;

pub trait EpochClock: Send + Sync + 'static {
    fn epoch_ms(&self) -> u64;
}

impl<C: Clock> EpochClock for C {
    fn epoch_ms(&self) -> u64 {
        Clock::epoch_ms(self)
    }
}

pub type ClockHandle = Arc<dyn EpochClock>;
