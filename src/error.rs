//! Error types shared by all bridge components.

use std::net::SocketAddr;

/// Represents all failures the bridge can report.
///
/// Every variant surfacing from [`crate::poll::PollLoop::run`] is fatal by
/// policy: the top-level handler logs it and exits, and a supervisor is
/// expected to restart the process. Individual register read failures below
/// the error budget are handled inside the read pipeline and never show up
/// here.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The configured device host could not be resolved to a socket address.
    #[error("cannot resolve Modbus host '{spec}'")]
    Resolve {
        spec: String,
        #[source]
        source: std::io::Error,
    },

    /// Establishing the Modbus TCP connection failed.
    #[error("Modbus TCP connect to {addr} failed")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Transport-level Modbus failure.
    #[error(transparent)]
    Modbus(#[from] tokio_modbus::Error),

    /// The device answered with a Modbus exception.
    #[error(transparent)]
    Exception(#[from] tokio_modbus::ExceptionCode),

    /// The register read error budget is exhausted. Sustained protocol
    /// failure points at a device or link fault this process cannot fix.
    #[error("register read failed {failures} times, giving up")]
    ReadBudgetExhausted { failures: u32 },

    /// A parameter table failed validation.
    #[error("invalid parameter table: {0}")]
    InvalidTable(&'static str),

    /// Publishing a decoded value to the bus failed.
    #[error("publish to '{topic}' failed")]
    Publish {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// The result type used throughout the bridge.
pub type Result<T> = std::result::Result<T, Error>;
