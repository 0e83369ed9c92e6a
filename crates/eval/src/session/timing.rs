//! Time spent in an item, accumulated over enter/suspend/resume/end
//! intervals from caller-supplied timestamps.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRecord {
    /// Start of the open interval, if the clock is running.
    #[serde(default, with = "time::serde::rfc3339::option")]
    started: Option<OffsetDateTime>,
    /// Closed intervals, in seconds.
    #[serde(default)]
    accumulated: f64,
}

impl TimeRecord {
    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Open an interval at `now`. A running clock keeps its original start.
    pub fn start(&mut self, now: OffsetDateTime) {
        if self.started.is_none() {
            self.started = Some(now);
        }
    }

    /// Close the open interval at `now`.
    pub fn stop(&mut self, now: OffsetDateTime) {
        if let Some(started) = self.started.take() {
            self.accumulated += seconds(now - started);
        }
    }

    /// Total seconds including the open interval up to `now`.
    pub fn elapsed(&self, now: OffsetDateTime) -> f64 {
        let open = self.started.map_or(0.0, |started| seconds(now - started));
        self.accumulated + open
    }
}

/// Negative spans (clock moved backwards) count as zero.
fn seconds(span: Duration) -> f64 {
    span.as_seconds_f64().max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn accumulates_across_intervals() {
        let mut record = TimeRecord::default();
        record.start(datetime!(2024-01-01 10:00:00 UTC));
        record.stop(datetime!(2024-01-01 10:00:30 UTC));
        assert!(!record.is_running());
        record.start(datetime!(2024-01-01 11:00:00 UTC));
        assert_eq!(record.elapsed(datetime!(2024-01-01 11:00:15 UTC)), 45.0);
        record.stop(datetime!(2024-01-01 11:00:20 UTC));
        assert_eq!(record.elapsed(datetime!(2024-01-01 12:00:00 UTC)), 50.0);
    }

    #[test]
    fn backwards_clock_adds_nothing() {
        let mut record = TimeRecord::default();
        record.start(datetime!(2024-01-01 10:00:00 UTC));
        record.stop(datetime!(2024-01-01 09:00:00 UTC));
        assert_eq!(record.elapsed(datetime!(2024-01-01 09:00:00 UTC)), 0.0);
    }

    #[test]
    fn serializes_open_interval() {
        let mut record = TimeRecord::default();
        record.start(datetime!(2024-01-01 10:00:00 UTC));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["started"], "2024-01-01T10:00:00Z");
        let back: TimeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
