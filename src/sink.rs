//! Publish-side collaborators.

use crate::pipeline::ReadCycle;
use crate::protocol::{ParameterTable, STATUS_SLOT};
use crate::Result;
use log::{debug, info};

/// Destination for decoded register values.
///
/// Implementations must be callable from the poll thread at any time; any
/// background network housekeeping belongs to the implementation, never to
/// the poll loop.
pub trait MeasurementSink {
    /// Publishes one rendered value. A failure is fatal for the bridge.
    fn publish(&mut self, topic: &str, payload: &str) -> Result<()>;
}

/// Pushes every populated slot of a read cycle to the sink, in table order.
///
/// The status slot is never published, and slots without a value this cycle
/// are skipped so the previously retained value stays untouched on the bus.
pub fn publish_cycle<S: MeasurementSink>(
    sink: &mut S,
    table: &ParameterTable,
    cycle: &ReadCycle,
) -> Result<()> {
    for (slot, param) in table.iter().enumerate() {
        if slot == STATUS_SLOT {
            continue;
        }
        let text = cycle.text(slot);
        if text.is_empty() {
            continue;
        }
        debug!("publish {} = {}", param.topic, text);
        sink.publish(param.topic, text)?;
    }
    Ok(())
}

/// Sink that only logs, for dry runs without a broker.
#[derive(Debug, Default)]
pub struct NullSink;

impl MeasurementSink for NullSink {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        info!("dry-run publish {topic} = {payload}");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Records published messages for assertions.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub(crate) messages: Vec<(String, String)>,
    }

    impl MeasurementSink for RecordingSink {
        fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
            self.messages.push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingSink;
    use super::*;
    use crate::{Error, Result};
    use assert_matches::assert_matches;

    #[test]
    fn skips_the_status_slot_and_empty_slots() {
        let table = ParameterTable::builtin();
        let cycle = ReadCycle::for_tests(
            vec![
                "203".to_string(),
                "29.1".to_string(),
                String::new(),
                "1.234".to_string(),
                String::new(),
                "2.50".to_string(),
            ],
            0x0203,
        );
        let mut sink = RecordingSink::default();

        publish_cycle(&mut sink, &table, &cycle).unwrap();

        assert_eq!(
            sink.messages,
            vec![
                ("sun/internalTemp".to_string(), "29.1".to_string()),
                ("sun/inputPower".to_string(), "1.234".to_string()),
                ("sun/dailyEnergy".to_string(), "2.50".to_string()),
            ]
        );
    }

    #[test]
    fn all_empty_cycle_publishes_nothing() {
        let table = ParameterTable::builtin();
        let cycle = ReadCycle::for_tests(vec![String::new(); table.len()], 0xA000);
        let mut sink = RecordingSink::default();

        publish_cycle(&mut sink, &table, &cycle).unwrap();
        assert!(sink.messages.is_empty());
    }

    #[test]
    fn publish_failures_propagate() {
        struct FailingSink;
        impl MeasurementSink for FailingSink {
            fn publish(&mut self, topic: &str, _payload: &str) -> Result<()> {
                Err(Error::Publish {
                    topic: topic.to_string(),
                    source: "broker gone".into(),
                })
            }
        }

        let table = ParameterTable::builtin();
        let cycle = ReadCycle::for_tests(
            vec![String::new(), "29.1".to_string()],
            0x0203,
        );
        let result = publish_cycle(&mut FailingSink, &table, &cycle);
        assert_matches!(result, Err(Error::Publish { .. }));
    }
}
