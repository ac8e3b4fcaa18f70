//! Logging training statistics
mod display;
mod record;

pub use display::{ByTime, DisplayLogger};
pub use record::RecordLogger;

use log::warn;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Identifier of a logged value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(Cow<'static, str>);

impl Id {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Id {
    #[inline]
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Id {
    #[inline]
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value that can be logged.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LogValue {
    /// Nothing. No data to log.
    ///
    /// Still produces a placeholder entry for the name.
    Nothing,
    /// A scalar value. Aggregate by taking means.
    Scalar(f64),
    /// An increment to a counter. Aggregate by summing.
    Counter(u64),
}

impl LogValue {
    /// Name of the variant, used in error messages.
    const fn kind_name(&self) -> &'static str {
        match self {
            Self::Nothing => "nothing",
            Self::Scalar(_) => "scalar",
            Self::Counter(_) => "counter",
        }
    }
}

impl From<f64> for LogValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<f32> for LogValue {
    #[inline]
    fn from(value: f32) -> Self {
        Self::Scalar(value.into())
    }
}

/// Error logging a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LogError {
    #[error("\"{id}\": incompatible value {value:?}, expected a {expected}")]
    IncompatibleValue {
        id: Id,
        value: LogValue,
        expected: &'static str,
    },
}

impl LogError {
    pub(crate) fn incompatible(id: Id, value: LogValue, expected: &LogValue) -> Self {
        Self::IncompatibleValue {
            id,
            value,
            expected: expected.kind_name(),
        }
    }
}

/// Log time series statistics.
///
/// Values are logged in groups. Values logged within the same group are
/// summarized together by loggers that aggregate.
pub trait StatsLogger {
    /// Start a new group of values.
    fn group_start(&mut self);

    /// Log a value within the current group.
    ///
    /// # Returns
    /// An error if the value is structurally incompatible with previous values logged under the
    /// same id.
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError>;

    /// End the current group.
    fn group_end(&mut self);

    /// Write out any pending summaries.
    fn flush(&mut self);

    /// Log a single value as its own group.
    #[inline]
    fn log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        self.group_start();
        let result = self.group_log(id, value);
        self.group_end();
        result
    }

    /// Log a scalar value, warning instead of failing on an incompatible value.
    #[inline]
    fn log_scalar(&mut self, name: &'static str, value: f64) {
        self.group_start();
        self.group_log_scalar(name, value);
        self.group_end();
    }

    /// Log a scalar value within the current group, warning on an incompatible value.
    #[inline]
    fn group_log_scalar(&mut self, name: &'static str, value: f64) {
        if let Err(err) = self.group_log(name.into(), LogValue::Scalar(value)) {
            warn!("{}", err);
        }
    }
}

/// Logger that does nothing
impl StatsLogger for () {
    #[inline]
    fn group_start(&mut self) {}
    #[inline]
    fn group_log(&mut self, _: Id, _: LogValue) -> Result<(), LogError> {
        Ok(())
    }
    #[inline]
    fn group_end(&mut self) {}
    #[inline]
    fn flush(&mut self) {}
}

impl<L: StatsLogger + ?Sized> StatsLogger for &'_ mut L {
    #[inline]
    fn group_start(&mut self) {
        (**self).group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        (**self).group_log(id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        (**self).group_end()
    }
    #[inline]
    fn flush(&mut self) {
        (**self).flush()
    }
}

impl<L: StatsLogger + ?Sized> StatsLogger for Box<L> {
    #[inline]
    fn group_start(&mut self) {
        (**self).group_start()
    }
    #[inline]
    fn group_log(&mut self, id: Id, value: LogValue) -> Result<(), LogError> {
        (**self).group_log(id, value)
    }
    #[inline]
    fn group_end(&mut self) {
        (**self).group_end()
    }
    #[inline]
    fn flush(&mut self) {
        (**self).flush()
    }
}
