use super::{Id, LogError, LogValue, StatsLogger};

/// Logger that keeps every logged value in memory, in logging order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordLogger {
    pub records: Vec<(Id, LogValue)>,
}

impl RecordLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent scalar value logged under `name`.
    pub fn last_scalar(&self, name: &str) -> Option<f64> {
        self.records
            .iter()
            .rev()
            .find_map(|(id, value)| match value {
                LogValue::Scalar(x) if id.as_str() == name => Some(*x),
                _ => None,
            })
    }

    /// Iterate over the ids of all logged values.
    pub fn ids(&self) -> impl Iterator<Item = &Id> {
        self.records.iter().map(|(id, _)| id)
    }
}

impl StatsLogger for RecordLogger {
    fn group_start(&mut self) {}

    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.records.push((id, value));
        Ok(())
    }

    fn group_end(&mut self) {}

    fn flush(&mut self) {}
}
