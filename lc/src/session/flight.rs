//! In-flight gate
//!
//! One outstanding backend operation per session. Generation, model load and
//! branch all claim the same gate so they can never overlap. Overlapping
//! callers are rejected, not queued.

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

/// What currently holds the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Activity {
    Idle = 0,
    Generating = 1,
    LoadingModel = 2,
    Branching = 3,
}

impl Activity {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Activity::Generating,
            2 => Activity::LoadingModel,
            3 => Activity::Branching,
            _ => Activity::Idle,
        }
    }
}

#[derive(Debug, Default)]
pub struct FlightGate {
    state: AtomicU8,
}

impl FlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate for `activity`
    ///
    /// On contention returns the activity that currently holds it. The gate is
    /// released when the ticket drops, including when the owning future is
    /// dropped mid-await.
    pub fn claim(&self, activity: Activity) -> Result<FlightTicket<'_>, Activity> {
        debug_assert!(activity != Activity::Idle);
        match self
            .state
            .compare_exchange(Activity::Idle as u8, activity as u8, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(?activity, "claim: acquired");
                Ok(FlightTicket { gate: self, activity })
            }
            Err(current) => {
                let current = Activity::from_u8(current);
                debug!(?activity, ?current, "claim: busy");
                Err(current)
            }
        }
    }

    pub fn current(&self) -> Activity {
        Activity::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_generating(&self) -> bool {
        self.current() == Activity::Generating
    }
}

/// Proof of holding the gate
#[derive(Debug)]
pub struct FlightTicket<'a> {
    gate: &'a FlightGate,
    activity: Activity,
}

impl FlightTicket<'_> {
    pub fn activity(&self) -> Activity {
        self.activity
    }
}

impl Drop for FlightTicket<'_> {
    fn drop(&mut self) {
        debug!(activity = ?self.activity, "FlightTicket::drop: releasing");
        self.gate.state.store(Activity::Idle as u8, Ordering::Release);
    }
}
