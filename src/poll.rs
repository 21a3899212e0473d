//! The top-level polling cycle.

use crate::connection::Connection;
use crate::pipeline::{read_cycle, ReadErrorBudget};
use crate::protocol::ParameterTable;
use crate::sink::{publish_cycle, MeasurementSink};
use crate::state::{DeviceState, Intervals, StateTracker};
use crate::timer::Deadline;
use crate::Result;
use log::debug;
use std::thread;
use std::time::{Duration, Instant};

/// Timing knobs of the poll loop.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Slept after ensuring the connection, every cycle. The device needs
    /// settle time before it answers reliably.
    pub connect_settle: Duration,
    /// Slept after each register read. This is a turnaround requirement of
    /// the physical link, not an optimization target.
    pub pacing: Duration,
    /// Cycle interval per operating state.
    pub intervals: Intervals,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            connect_settle: Duration::from_secs(5),
            pacing: Duration::from_secs(2),
            intervals: Intervals::default(),
        }
    }
}

/// Drives the infinite poll / decode / publish cycle.
///
/// Strictly sequential: one device, one connection, one worker. The only
/// suspension points are the pacing sleep after each read, the post-connect
/// settle sleep and the absolute-deadline sleep at the end of each cycle.
#[derive(Debug)]
pub struct PollLoop<C, S> {
    connection: C,
    sink: S,
    table: ParameterTable,
    policy: PollPolicy,
    tracker: StateTracker,
    budget: ReadErrorBudget,
}

impl<C: Connection, S: MeasurementSink> PollLoop<C, S> {
    pub fn new(connection: C, sink: S, table: ParameterTable, policy: PollPolicy) -> Self {
        Self {
            connection,
            sink,
            table,
            policy,
            tracker: StateTracker::new(),
            budget: ReadErrorBudget::new(),
        }
    }

    /// Runs until a fatal error occurs; the caller is expected to log the
    /// error and exit the process.
    pub fn run(mut self) -> Result<()> {
        loop {
            self.poll_once()?;
        }
    }

    /// One complete cycle: ensure connection, read, publish, apply the state
    /// policy, then sleep until the absolute cycle deadline.
    pub fn poll_once(&mut self) -> Result<()> {
        let started = Instant::now();
        debug!("cycle start, state {}", self.tracker.state());

        let source = self.connection.ensure_connected()?;
        thread::sleep(self.policy.connect_settle);

        let cycle = read_cycle(source, &self.table, self.policy.pacing, &mut self.budget)?;
        publish_cycle(&mut self.sink, &self.table, &cycle)?;

        let decision = self
            .tracker
            .apply(cycle.classification(), &self.policy.intervals);
        if decision.teardown {
            self.connection.teardown();
        }

        Deadline::from_start(started, decision.interval).sleep();
        Ok(())
    }

    /// The state the last cycle settled on.
    pub fn state(&self) -> DeviceState {
        self.tracker.state()
    }
}
