//! YAML configuration of the bridge.
//!
//! Every field has a default so the bridge runs without a config file at
//! all, matching a typical single-host deployment (device and broker on
//! localhost).

use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use sunbridge_lib::poll::PollPolicy;
use sunbridge_lib::state::Intervals;

/// Config file looked up in the working directory when `--config` is not
/// given.
pub const DEFAULT_CONFIG_FILE: &str = "sunbridge.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_broker")]
    pub broker: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_mqtt_keep_alive", with = "humantime_serde")]
    pub keep_alive: Duration,
}

fn default_mqtt_broker() -> String {
    String::from("127.0.0.1")
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_client_id() -> String {
    String::from("sunbridge")
}

fn default_mqtt_keep_alive() -> Duration {
    Duration::from_secs(60)
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: default_mqtt_broker(),
            port: default_mqtt_port(),
            client_id: default_mqtt_client_id(),
            username: None,
            password: None,
            keep_alive: default_mqtt_keep_alive(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModbusConfig {
    #[serde(default = "default_modbus_host")]
    pub host: String,
    #[serde(default = "default_modbus_port")]
    pub port: u16,
    #[serde(default = "default_modbus_unit_id")]
    pub unit_id: u8,
    /// Settle time after (re)connecting, applied every cycle.
    #[serde(default = "default_connect_delay", with = "humantime_serde")]
    pub connect_delay: Duration,
    /// Modbus response timeout.
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Inter-request pacing delay; the device needs turnaround time between
    /// reads.
    #[serde(default = "default_write_delay", with = "humantime_serde")]
    pub write_delay: Duration,
}

fn default_modbus_host() -> String {
    String::from("127.0.0.1")
}

fn default_modbus_port() -> u16 {
    502
}

fn default_modbus_unit_id() -> u8 {
    1
}

fn default_connect_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_write_delay() -> Duration {
    Duration::from_secs(2)
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            host: default_modbus_host(),
            port: default_modbus_port(),
            unit_id: default_modbus_unit_id(),
            connect_delay: default_connect_delay(),
            read_timeout: default_read_timeout(),
            write_delay: default_write_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntervalsConfig {
    #[serde(default = "default_active_interval", with = "humantime_serde")]
    pub active: Duration,
    #[serde(default = "default_idle_interval", with = "humantime_serde")]
    pub idle: Duration,
    #[serde(default = "default_standby_interval", with = "humantime_serde")]
    pub standby: Duration,
}

fn default_active_interval() -> Duration {
    Duration::from_secs(120)
}

fn default_idle_interval() -> Duration {
    Duration::from_secs(900)
}

fn default_standby_interval() -> Duration {
    Duration::from_secs(120)
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            active: default_active_interval(),
            idle: default_idle_interval(),
            standby: default_standby_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub modbus: ModbusConfig,
    #[serde(default)]
    pub intervals: IntervalsConfig,
}

impl Config {
    /// Timing policy of the poll loop.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            connect_settle: self.modbus.connect_delay,
            pacing: self.modbus.write_delay,
            intervals: Intervals {
                active: self.intervals.active,
                idle: self.intervals.idle,
                standby: self.intervals.standby,
            },
        }
    }
}

/// Loads the configuration.
///
/// An explicitly given path must exist and parse; without one, a missing
/// default file silently falls back to the built-in defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                log::debug!("no config file found, using built-in defaults");
                return Ok(Config::default());
            }
            default
        }
    };
    log::debug!("loading config file {}", path.display());
    let file = File::open(path)
        .with_context(|| format!("cannot open config file {}", path.display()))?;
    let config = serde_yaml::from_reader(&file)
        .with_context(|| format!("cannot parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployed_values() {
        let config = Config::default();
        assert_eq!(config.mqtt.broker, "127.0.0.1");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.modbus.port, 502);
        assert_eq!(config.modbus.unit_id, 1);

        let policy = config.poll_policy();
        assert_eq!(policy.connect_settle, Duration::from_secs(5));
        assert_eq!(policy.pacing, Duration::from_secs(2));
        assert_eq!(policy.intervals.active, Duration::from_secs(120));
        assert_eq!(policy.intervals.idle, Duration::from_secs(900));
        assert_eq!(policy.intervals.standby, Duration::from_secs(120));
    }

    #[test]
    fn partial_config_files_keep_defaults_elsewhere() {
        let yaml = "
mqtt:
  broker: broker.lan
  username: solar
intervals:
  idle: 30min
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.mqtt.broker, "broker.lan");
        assert_eq!(config.mqtt.username.as_deref(), Some("solar"));
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.intervals.idle, Duration::from_secs(1800));
        assert_eq!(config.intervals.active, Duration::from_secs(120));
        assert_eq!(config.modbus.host, "127.0.0.1");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = "
modbus:
  hostname: oops
";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }
}
