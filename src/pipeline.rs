//! Register read pipeline: one ordered pass over the parameter table.

use crate::connection::RegisterSource;
use crate::protocol::{
    assemble_words, ParameterTable, IDLE_STATUS, INTERNAL_TEMPERATURE_SLOT, STATUS_SLOT,
};
use crate::state::DeviceState;
use crate::{Error, Result};
use log::{debug, trace, warn};
use std::thread;
use std::time::Duration;

/// Register read failures tolerated before the process gives up.
pub const READ_ERROR_LIMIT: u32 = 3;

/// Counts register read failures over the process lifetime.
///
/// The count is deliberately never reset on a successful read: any
/// [`READ_ERROR_LIMIT`] failed reads are fatal, however far apart they are.
/// A healthy link produces none, so widely separated failures still indicate
/// a device worth a fresh process.
#[derive(Debug, Default)]
pub struct ReadErrorBudget {
    failures: u32,
}

impl ReadErrorBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total failures recorded so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn record_failure(&mut self) -> Result<()> {
        self.failures += 1;
        if self.failures >= READ_ERROR_LIMIT {
            Err(Error::ReadBudgetExhausted {
                failures: self.failures,
            })
        } else {
            Ok(())
        }
    }
}

/// Decoded output of one pass over the parameter table.
///
/// Rebuilt from scratch every cycle. An empty slot text means "no value this
/// cycle", which is distinct from a rendered `"0"`.
#[derive(Debug)]
pub struct ReadCycle {
    texts: Vec<String>,
    status: u32,
}

impl ReadCycle {
    /// Rendered text for `slot`; empty when the slot carried no value.
    pub fn text(&self, slot: usize) -> &str {
        self.texts.get(slot).map(String::as_str).unwrap_or("")
    }

    /// Raw assembled value of the status slot. Zero if the status read
    /// failed this cycle.
    pub fn status(&self) -> u32 {
        self.status
    }

    /// Operating state derived from the status word.
    pub fn classification(&self) -> DeviceState {
        DeviceState::from_status(self.status)
    }

    #[cfg(test)]
    pub(crate) fn for_tests(texts: Vec<String>, status: u32) -> Self {
        Self { texts, status }
    }
}

/// Reads every descriptor in table order and decodes the results.
///
/// `pacing` is slept after each issued read; the physical link needs
/// turnaround time between requests. Individual read failures are logged and
/// charged against `budget`; only an exhausted budget aborts the cycle.
///
/// Once the status slot reads the idle sentinel the remaining reads are
/// skipped entirely: the device reports no data in that regime and further
/// reads may legitimately fail.
pub fn read_cycle<S: RegisterSource>(
    source: &mut S,
    table: &ParameterTable,
    pacing: Duration,
    budget: &mut ReadErrorBudget,
) -> Result<ReadCycle> {
    let mut texts = vec![String::new(); table.len()];
    let mut status: u32 = 0;

    debug!("reading {} parameters", table.len());
    for (slot, param) in table.iter().enumerate() {
        match source.read_registers(param.address, param.word_count) {
            Err(err) => {
                warn!("read of {} (slot {slot}) failed: {err}", param.topic);
                budget.record_failure()?;
            }
            Ok(words) => {
                let value = assemble_words(&words);
                if slot == STATUS_SLOT {
                    status = value;
                    if value == IDLE_STATUS {
                        debug!("idle status word, skipping remaining reads");
                        break;
                    }
                }
                let text = param.render(value);
                trace!("{} = {:?} {:04x?}", param.topic, text, words);
                texts[slot] = text;
            }
        }
        thread::sleep(pacing);
    }

    // While idle the internal temperature register reads as a stale zero;
    // never let that escape as a real value.
    if status == IDLE_STATUS {
        if let Some(text) = texts.get_mut(INTERNAL_TEMPERATURE_SLOT) {
            text.clear();
        }
    }

    Ok(ReadCycle { texts, status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::VecDeque;

    struct ScriptedSource {
        responses: VecDeque<Result<Vec<u16>>>,
        reads: Vec<(u16, u16)>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<u16>>>) -> Self {
            Self {
                responses: responses.into(),
                reads: Vec::new(),
            }
        }
    }

    impl RegisterSource for ScriptedSource {
        fn read_registers(&mut self, address: u16, quantity: u16) -> Result<Vec<u16>> {
            self.reads.push((address, quantity));
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(transport_error()))
        }
    }

    fn transport_error() -> Error {
        Error::Modbus(tokio_modbus::Error::Transport(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out",
        )))
    }

    #[test]
    fn full_cycle_decodes_all_slots() {
        let table = ParameterTable::builtin();
        let mut source = ScriptedSource::new(vec![
            Ok(vec![0x0203]),         // status, active family
            Ok(vec![291]),            // internal temp, 29.1 °C
            Ok(vec![0x0000, 0x04D2]), // active power, 1234 / 1000
            Ok(vec![0x0000, 2500]),   // input power
            Ok(vec![0x0001, 0x0002]), // accumulated energy
            Ok(vec![0x0000, 250]),    // daily energy
        ]);
        let mut budget = ReadErrorBudget::new();

        let cycle = read_cycle(&mut source, &table, Duration::ZERO, &mut budget).unwrap();

        assert_eq!(cycle.status(), 0x0203);
        assert_eq!(cycle.classification(), DeviceState::Active);
        assert_eq!(cycle.text(0), "203");
        assert_eq!(cycle.text(1), "29.1");
        assert_eq!(cycle.text(2), "1.234");
        assert_eq!(cycle.text(3), "2.500");
        assert_eq!(cycle.text(4), "655.38"); // 0x0001_0002 / 100
        assert_eq!(cycle.text(5), "2.50");

        // One read per descriptor, issued in table order.
        assert_eq!(source.reads.len(), table.len());
        assert_eq!(source.reads[0], (32089, 1));
        assert_eq!(source.reads[2], (32080, 2));
    }

    #[test]
    fn idle_status_short_circuits_the_cycle() {
        let table = ParameterTable::builtin();
        let mut source = ScriptedSource::new(vec![Ok(vec![0xA000])]);
        let mut budget = ReadErrorBudget::new();

        let cycle = read_cycle(&mut source, &table, Duration::ZERO, &mut budget).unwrap();

        assert_eq!(source.reads.len(), 1);
        assert_eq!(cycle.status(), IDLE_STATUS);
        assert_eq!(cycle.classification(), DeviceState::Idle);
        for slot in 0..table.len() {
            assert_eq!(cycle.text(slot), "", "slot {slot} must stay empty");
        }
    }

    #[test]
    fn failed_status_read_defaults_to_standby() {
        let table = ParameterTable::builtin();
        let mut source = ScriptedSource::new(vec![
            Err(transport_error()),
            Ok(vec![291]),
            Ok(vec![0, 1000]),
            Ok(vec![0, 1000]),
            Ok(vec![0, 100]),
            Ok(vec![0, 100]),
        ]);
        let mut budget = ReadErrorBudget::new();

        let cycle = read_cycle(&mut source, &table, Duration::ZERO, &mut budget).unwrap();

        assert_eq!(cycle.status(), 0);
        assert_eq!(cycle.classification(), DeviceState::Standby);
        assert_eq!(cycle.text(0), "");
        assert_eq!(cycle.text(1), "29.1");
        assert_eq!(budget.failures(), 1);
    }

    #[test]
    fn two_failures_and_a_success_survive() {
        let table = ParameterTable::builtin();
        let mut source = ScriptedSource::new(vec![
            Err(transport_error()),
            Err(transport_error()),
            Ok(vec![0, 1000]),
            Ok(vec![0, 1000]),
            Ok(vec![0, 100]),
            Ok(vec![0, 100]),
        ]);
        let mut budget = ReadErrorBudget::new();

        let cycle = read_cycle(&mut source, &table, Duration::ZERO, &mut budget).unwrap();
        assert_eq!(budget.failures(), 2);
        assert_eq!(cycle.text(2), "1.000");
    }

    #[test]
    fn third_failure_exhausts_the_budget() {
        let table = ParameterTable::builtin();
        let mut budget = ReadErrorBudget::new();

        // Two failures in an earlier cycle; the budget spans cycles and a
        // successful cycle in between does not replenish it.
        let mut source = ScriptedSource::new(vec![
            Err(transport_error()),
            Err(transport_error()),
            Ok(vec![0, 1000]),
            Ok(vec![0, 1000]),
            Ok(vec![0, 100]),
            Ok(vec![0, 100]),
        ]);
        read_cycle(&mut source, &table, Duration::ZERO, &mut budget).unwrap();

        let mut source = ScriptedSource::new(vec![
            Ok(vec![0x0203]),
            Err(transport_error()),
        ]);
        let result = read_cycle(&mut source, &table, Duration::ZERO, &mut budget);
        assert_matches!(result, Err(Error::ReadBudgetExhausted { failures: 3 }));
    }
}
