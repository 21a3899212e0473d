//! Lazily created Modbus TCP connection to the device.

use crate::{Error, Result};
use log::{debug, info};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tokio_modbus::client::sync::Context;
use tokio_modbus::prelude::SyncReader;
use tokio_modbus::Slave;

/// A source of consecutive 16-bit register reads.
///
/// This is the transport seam of the read pipeline; tests substitute
/// scripted implementations for the real Modbus context.
pub trait RegisterSource {
    /// Reads `quantity` consecutive holding registers starting at `address`.
    fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>>;
}

impl RegisterSource for Context {
    fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>> {
        match self.read_holding_registers(address, quantity) {
            Ok(Ok(words)) => Ok(words),
            Ok(Err(exception)) => Err(exception.into()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Owns the device connection and reconnects on demand.
pub trait Connection {
    type Source: RegisterSource;

    /// Returns the existing connection, establishing a new one if absent.
    fn ensure_connected(&mut self) -> Result<&mut Self::Source>;

    /// Drops the connection so the next cycle reconnects from scratch.
    /// Idempotent.
    fn teardown(&mut self);
}

/// Modbus TCP connection manager for the inverter.
///
/// The handle is absent until first use and torn down whenever the device
/// goes idle; in that regime the link is unreliable and must be rebuilt.
pub struct ModbusTcpConnection {
    addr: SocketAddr,
    unit_id: u8,
    response_timeout: Duration,
    ctx: Option<Context>,
}

impl std::fmt::Debug for ModbusTcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTcpConnection")
            .field("addr", &self.addr)
            .field("unit_id", &self.unit_id)
            .field("response_timeout", &self.response_timeout)
            .field("ctx", &self.ctx.as_ref().map(|_| "Context"))
            .finish()
    }
}

impl ModbusTcpConnection {
    /// Resolves `host:port` once at startup. A resolution failure is fatal,
    /// the operator has misconfigured the bridge.
    pub fn new(host: &str, port: u16, unit_id: u8, response_timeout: Duration) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|source| Error::Resolve {
                spec: format!("{host}:{port}"),
                source,
            })?
            .next()
            .ok_or_else(|| Error::Resolve {
                spec: format!("{host}:{port}"),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no addresses returned",
                ),
            })?;
        Ok(Self {
            addr,
            unit_id,
            response_timeout,
            ctx: None,
        })
    }

    /// The resolved device address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Connection for ModbusTcpConnection {
    type Source = Context;

    fn ensure_connected(&mut self) -> Result<&mut Context> {
        match self.ctx {
            Some(ref mut ctx) => Ok(ctx),
            None => {
                info!(
                    "connecting to Modbus device at {} (unit {})",
                    self.addr, self.unit_id
                );
                let mut ctx = tokio_modbus::client::sync::tcp::connect_slave(
                    self.addr,
                    Slave(self.unit_id),
                )
                .map_err(|source| Error::Connect {
                    addr: self.addr,
                    source,
                })?;
                ctx.set_timeout(Some(self.response_timeout));
                Ok(self.ctx.insert(ctx))
            }
        }
    }

    fn teardown(&mut self) {
        if self.ctx.take().is_some() {
            debug!("Modbus connection to {} closed", self.addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn resolves_numeric_hosts() {
        let conn =
            ModbusTcpConnection::new("127.0.0.1", 502, 1, Duration::from_secs(5)).unwrap();
        assert_eq!(conn.addr(), "127.0.0.1:502".parse().unwrap());
    }

    #[test]
    fn unresolvable_host_is_reported() {
        let result =
            ModbusTcpConnection::new("sunbridge.invalid", 502, 1, Duration::from_secs(5));
        assert_matches!(result, Err(Error::Resolve { .. }));
    }

    #[test]
    fn teardown_without_connection_is_a_noop() {
        let mut conn =
            ModbusTcpConnection::new("127.0.0.1", 502, 1, Duration::from_secs(5)).unwrap();
        conn.teardown();
        conn.teardown();
    }
}
