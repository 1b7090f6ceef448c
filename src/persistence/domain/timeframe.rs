//! Half-open time windows bounding history queries.

use super::{Condition, TimeframeError};
use chrono::{DateTime, Utc};

/// Time window `[start, stop)`; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeframe {
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
}

impl Timeframe {
    /// Creates a window from optional bounds.
    ///
    /// # Errors
    ///
    /// Returns [`TimeframeError`] when both bounds are set and `stop` is
    /// before `start`.
    pub fn new(
        start: Option<DateTime<Utc>>,
        stop: Option<DateTime<Utc>>,
    ) -> Result<Self, TimeframeError> {
        if let (Some(from), Some(to)) = (start, stop) {
            if to < from {
                return Err(TimeframeError {
                    start: from,
                    stop: to,
                });
            }
        }
        Ok(Self { start, stop })
    }

    /// Creates a window bounded on both sides.
    ///
    /// # Errors
    ///
    /// Returns [`TimeframeError`] when `stop` is before `start`.
    pub fn between(start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<Self, TimeframeError> {
        Self::new(Some(start), Some(stop))
    }

    /// Creates a window open towards the future.
    #[must_use]
    pub const fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            stop: None,
        }
    }

    /// Creates a window open towards the past.
    #[must_use]
    pub const fn until(stop: DateTime<Utc>) -> Self {
        Self {
            start: None,
            stop: Some(stop),
        }
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Exclusive upper bound.
    #[must_use]
    pub const fn stop(&self) -> Option<DateTime<Utc>> {
        self.stop
    }

    /// Returns `true` when `instant` lies in the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| instant >= start)
            && self.stop.is_none_or(|stop| instant < stop)
    }

    /// Expresses the window as query conditions on `column`.
    #[must_use]
    pub fn conditions(&self, column: &str) -> Vec<Condition> {
        let lower = self.start.map(|start| Condition::ge(column, start));
        let upper = self.stop.map(|stop| Condition::lt(column, stop));
        lower.into_iter().chain(upper).collect()
    }
}
