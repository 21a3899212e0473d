//! MQTT publishing backend.

use crate::config::MqttConfig;
use anyhow::{Context as _, Result};
use log::info;
use paho_mqtt as mqtt;
use std::time::Duration;
use sunbridge_lib::sink::MeasurementSink;
use sunbridge_lib::Error;

/// Quality of service for measurement publishes: at-least-once.
const QOS: i32 = 1;

/// Timeout for synchronous broker calls.
const SYNC_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sink publishing rendered values as retained MQTT messages.
///
/// The paho client runs its own network thread for keep-alive and reconnect
/// housekeeping, so publishes are safe to issue from the poll thread at any
/// time.
pub struct MqttSink {
    client: mqtt::Client,
}

impl MqttSink {
    /// Creates the client and connects to the broker. A connection failure
    /// here is fatal; the bridge does not start without its bus.
    pub fn connect(config: &MqttConfig) -> Result<Self> {
        let uri = format!("tcp://{}:{}", config.broker, config.port);
        let create_opts = mqtt::CreateOptionsBuilder::new()
            .server_uri(&uri)
            .client_id(&config.client_id)
            .finalize();
        let mut client =
            mqtt::Client::new(create_opts).with_context(|| "cannot create MQTT client")?;
        client.set_timeout(SYNC_CALL_TIMEOUT);

        let mut conn_builder = mqtt::ConnectOptionsBuilder::new();
        let mut conn_builder = conn_builder
            .keep_alive_interval(config.keep_alive)
            .clean_session(true)
            .automatic_reconnect(Duration::from_secs(1), Duration::from_secs(30));
        if let Some(username) = &config.username {
            conn_builder = conn_builder.user_name(username);
        }
        if let Some(password) = &config.password {
            conn_builder = conn_builder.password(password.as_str());
        }
        let conn_opts = conn_builder.finalize();

        info!(
            "connecting to MQTT broker {uri} as '{}'",
            config.client_id
        );
        client
            .connect(conn_opts)
            .with_context(|| format!("cannot connect to MQTT broker {uri}"))?;
        Ok(Self { client })
    }
}

impl MeasurementSink for MqttSink {
    fn publish(&mut self, topic: &str, payload: &str) -> sunbridge_lib::Result<()> {
        let msg = mqtt::Message::new_retained(topic, payload, QOS);
        self.client.publish(msg).map_err(|source| Error::Publish {
            topic: topic.to_string(),
            source: Box::new(source),
        })
    }
}
