//! Operating-state model and per-state polling policy.
//!
//! The next state is purely a function of the status word read this cycle;
//! the only memory beyond "current state" is the standby escalation counter.

use crate::protocol::{ACTIVE_STATUS_MASK, ACTIVE_STATUS_VALUE, IDLE_STATUS};
use log::info;
use std::fmt;
use std::time::Duration;

/// Operating regime of the inverter, derived from the status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Door-step between idle and active, typically dawn and dusk.
    Standby,
    /// Normal grid-feeding operation.
    Active,
    /// Shut down, no power from the panels.
    Idle,
}

impl DeviceState {
    /// Classifies a raw status word.
    ///
    /// Total by construction: anything that is neither the idle sentinel nor
    /// part of the active family counts as standby.
    pub fn from_status(status: u32) -> Self {
        if status == IDLE_STATUS {
            DeviceState::Idle
        } else if status & ACTIVE_STATUS_MASK == ACTIVE_STATUS_VALUE {
            DeviceState::Active
        } else {
            DeviceState::Standby
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DeviceState::Standby => "STANDBY",
            DeviceState::Active => "ACTIVE",
            DeviceState::Idle => "IDLE",
        };
        write!(f, "{name}")
    }
}

/// Poll interval per operating state.
#[derive(Debug, Clone, Copy)]
pub struct Intervals {
    pub active: Duration,
    pub idle: Duration,
    pub standby: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            active: Duration::from_secs(120),
            idle: Duration::from_secs(900),
            standby: Duration::from_secs(120),
        }
    }
}

impl Intervals {
    /// Interval to sleep after a cycle that settled in `state`.
    pub fn for_state(&self, state: DeviceState) -> Duration {
        match state {
            DeviceState::Standby => self.standby,
            DeviceState::Active => self.active,
            DeviceState::Idle => self.idle,
        }
    }
}

/// Consecutive standby cycles tolerated before the state is reinterpreted
/// as idle.
pub const MAX_STANDBY_CYCLES: u32 = 20;

/// What the poll loop must do after a completed read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleDecision {
    /// State the tracker settled on, after any standby escalation.
    pub state: DeviceState,
    /// How long to sleep, measured from the start of the cycle.
    pub interval: Duration,
    /// The device connection must be dropped so that the next cycle
    /// reconnects from scratch.
    pub teardown: bool,
}

/// Tracks the device state across poll cycles.
#[derive(Debug)]
pub struct StateTracker {
    state: DeviceState,
    standby_streak: u32,
}

impl StateTracker {
    /// A fresh tracker. Starts in standby, matching a device whose regime is
    /// not yet known.
    pub fn new() -> Self {
        Self {
            state: DeviceState::Standby,
            standby_streak: 0,
        }
    }

    /// The state the last cycle settled on.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Applies the classification of a completed read cycle.
    ///
    /// A run of more than [`MAX_STANDBY_CYCLES`] standby classifications is
    /// escalated to idle: prolonged ambiguous standby readings mean the
    /// device has effectively shut down, and staying in standby would keep
    /// polling it at the fast cadence forever.
    pub fn apply(&mut self, observed: DeviceState, intervals: &Intervals) -> CycleDecision {
        let mut next = observed;
        match next {
            DeviceState::Standby => {
                self.standby_streak += 1;
                if self.standby_streak > MAX_STANDBY_CYCLES {
                    info!(
                        "standby for {} consecutive cycles, forcing idle",
                        self.standby_streak
                    );
                    next = DeviceState::Idle;
                    self.standby_streak = 0;
                }
            }
            DeviceState::Active | DeviceState::Idle => self.standby_streak = 0,
        }

        if next != self.state {
            info!("state change: {} -> {}", self.state, next);
        }
        self.state = next;

        CycleDecision {
            state: next,
            interval: intervals.for_state(next),
            teardown: next == DeviceState::Idle,
        }
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
