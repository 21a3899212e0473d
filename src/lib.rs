//! Modbus-to-MQTT polling bridge for a grid-tied solar inverter.
//!
//! The bridge periodically reads a fixed table of holding registers from a
//! single inverter over Modbus TCP, decodes them into engineering values and
//! republishes them as retained MQTT messages. The polling cadence adapts to
//! the operating regime the inverter reports through its status register:
//!
//! * **ACTIVE** - feeding the grid, polled at the normal interval.
//! * **STANDBY** - door-step between idle and active; polled at the normal
//!   interval, but a long run of standby readings is escalated to idle.
//! * **IDLE** - shut down for the night; polled rarely, and the Modbus
//!   connection is dropped between cycles because the link is unreliable in
//!   this regime.
//!
//! [`poll::PollLoop`] composes the pieces:
//!
//! * [`protocol`] - the register table and value decoding.
//! * [`connection`] - the lazily created Modbus TCP connection.
//! * [`pipeline`] - one ordered read pass over the table per cycle.
//! * [`state`] - state classification, standby escalation and intervals.
//! * [`sink`] - the publish seam the MQTT backend plugs into.
//! * [`timer`] - absolute-deadline cycle scheduling.
//!
//! Failure policy is deliberately fail-fast: connection establishment
//! failures, publish failures and an exhausted read error budget all bubble
//! up as [`Error`] and terminate the process, leaving recovery to an
//! external supervisor. The `sunbridge` binary wires the loop to a real
//! device and broker.

pub mod connection;
pub mod error;
pub mod pipeline;
pub mod poll;
pub mod protocol;
pub mod sink;
pub mod state;
pub mod timer;

pub use error::{Error, Result};
