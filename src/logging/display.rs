//! Command-line logger
use super::{Id, LogError, LogValue, StatsLogger};
use crate::utils::stats::RunningStats;
use coarsetime::{Duration as CDuration, Instant as CInstant};
use std::collections::{btree_map::Entry, BTreeMap};
use std::fmt;
use std::time::{Duration, Instant};
use yansi::Paint;

/// Chunk summaries at fixed time intervals.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ByTime {
    // Coarse time because the clock is checked at the start of every log group.
    pub chunk_duration: CDuration,
    coarse_chunk_start: CInstant,
}

impl ByTime {
    pub fn new(chunk_duration: Duration) -> Self {
        Self {
            chunk_duration: CDuration::new(chunk_duration.as_secs(), chunk_duration.subsec_nanos()),
            coarse_chunk_start: CInstant::now(),
        }
    }

    /// Whether the chunk duration has elapsed.
    fn is_elapsed(&self) -> bool {
        self.coarse_chunk_start.elapsed() > self.chunk_duration
    }

    fn reset(&mut self) {
        self.coarse_chunk_start = CInstant::now();
    }
}

impl Default for ByTime {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Logger that displays grouped summaries to standard output.
///
/// Values are aggregated into summaries (means and standard deviations for scalars, totals for
/// counters) that are printed whenever the chunk duration elapses or on [`flush`].
///
/// [`flush`]: StatsLogger::flush
#[derive(Debug)]
pub struct DisplayLogger {
    chunker: ByTime,
    // Sorted so that summaries are displayed in a consistent order.
    summaries: BTreeMap<Id, Node>,
    chunk_start: Instant,
}

impl DisplayLogger {
    pub fn new(chunk_duration: Duration) -> Self {
        Self {
            chunker: ByTime::new(chunk_duration),
            summaries: BTreeMap::new(),
            chunk_start: Instant::now(),
        }
    }
}

impl Default for DisplayLogger {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl StatsLogger for DisplayLogger {
    fn group_start(&mut self) {
        // Checked before logging so that a burst of values is not split across two chunks.
        if self.chunker.is_elapsed() {
            self.flush();
        }
    }

    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        match self.summaries.entry(id) {
            Entry::Vacant(e) => {
                e.insert(Node::new(value));
                Ok(())
            }
            Entry::Occupied(e) => {
                let id = e.key().clone();
                e.into_mut().push(id, value)
            }
        }
    }

    fn group_end(&mut self) {}

    fn flush(&mut self) {
        let elapsed = self.chunk_start.elapsed();
        println!();
        println!("{}", Paint::fixed(8, format!("-- {:.1?} --", elapsed)));
        for (id, node) in self.summaries.iter().filter(|(_, node)| node.dirty) {
            println!("{:<24} {}", Paint::fixed(35, id), node.summary);
        }
        for node in self.summaries.values_mut() {
            node.reset();
        }
        self.chunk_start = Instant::now();
        self.chunker.reset();
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    summary: Summary,
    dirty: bool,
}

impl Node {
    fn new(value: LogValue) -> Self {
        Self {
            summary: value.into(),
            dirty: true,
        }
    }

    fn push(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.summary.push(id, value)?;
        self.dirty = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.summary.reset();
        self.dirty = false;
    }
}

/// Summary of the values logged under one id within a chunk.
#[derive(Debug, Clone, PartialEq)]
enum Summary {
    Nothing,
    Scalar(RunningStats<f64>),
    Counter { increment: u64, initial_value: u64 },
}

impl From<LogValue> for Summary {
    fn from(value: LogValue) -> Self {
        match value {
            LogValue::Nothing => Self::Nothing,
            LogValue::Scalar(x) => {
                let mut stats = RunningStats::default();
                stats.push(x);
                Self::Scalar(stats)
            }
            LogValue::Counter(increment) => Self::Counter {
                increment,
                initial_value: 0,
            },
        }
    }
}

impl Summary {
    fn push(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        match (self, value) {
            (Self::Nothing, LogValue::Nothing) => {}
            (Self::Scalar(stats), LogValue::Scalar(x)) => stats.push(x),
            (Self::Counter { increment, .. }, LogValue::Counter(i)) => *increment += i,
            (summary, value) => {
                let expected = match summary {
                    Self::Nothing => LogValue::Nothing,
                    Self::Scalar(_) => LogValue::Scalar(0.0),
                    Self::Counter { .. } => LogValue::Counter(0),
                };
                return Err(LogError::incompatible(id, value, &expected));
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        match self {
            Self::Nothing => {}
            Self::Scalar(stats) => *stats = RunningStats::default(),
            Self::Counter {
                increment,
                initial_value,
            } => {
                *initial_value += *increment;
                *increment = 0;
            }
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Nothing => Ok(()),
            Self::Scalar(stats) => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{:.4}", mean)?;
                }
                if let Some(std_dev) = stats.std_dev() {
                    write!(f, " {}", Paint::fixed(8, format!("(σ {:.4})", std_dev)))?;
                }
                Ok(())
            }
            Self::Counter {
                increment,
                initial_value,
            } => write!(
                f,
                "{}  (+{})",
                initial_value + increment,
                Paint::fixed(253, increment)
            ),
        }
    }
}
