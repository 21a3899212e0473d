//! Inverter Modbus-to-MQTT bridge daemon.
//!
//! Polls a fixed register table from a single solar inverter over Modbus
//! TCP and republishes the decoded values as retained MQTT messages. The
//! polling cadence follows the operating state the inverter reports; see
//! the `sunbridge_lib` crate documentation for the state model.
//!
//! Any fatal condition (connection establishment, publish failure, an
//! exhausted read error budget) terminates the process with a diagnostic;
//! restarting is the supervisor's job.

use anyhow::{Context as _, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::panic;
use sunbridge_lib::connection::ModbusTcpConnection;
use sunbridge_lib::poll::PollLoop;
use sunbridge_lib::protocol::ParameterTable;
use sunbridge_lib::sink::{MeasurementSink, NullSink};

mod commandline;
mod config;
mod mqtt;

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<cause unknown>"
        };

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

fn run_bridge<S: MeasurementSink>(config: &config::Config, sink: S) -> Result<()> {
    let connection = ModbusTcpConnection::new(
        &config.modbus.host,
        config.modbus.port,
        config.modbus.unit_id,
        config.modbus.read_timeout,
    )?;
    info!(
        "polling inverter at {} every {:?} (active) / {:?} (idle)",
        connection.addr(),
        config.intervals.active,
        config.intervals.idle
    );

    let bridge = PollLoop::new(
        connection,
        sink,
        ParameterTable::builtin(),
        config.poll_policy(),
    );
    // Only returns on a fatal error.
    bridge.run()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();
    let _log_handle = logging_init(args.verbose.log_level_filter());

    let config = config::load(args.config.as_deref())?;
    trace!("config: {config:?}");
    info!("starting");

    if args.no_publish {
        warn!("publishing disabled, decoded values are logged only");
        run_bridge(&config, NullSink)
    } else {
        let sink = mqtt::MqttSink::connect(&config.mqtt)
            .with_context(|| "cannot connect to MQTT broker")?;
        run_bridge(&config, sink)
    }
}
