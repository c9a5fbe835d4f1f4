use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trailing backoff applied to the window start so samples the upstream
/// ingests late are still picked up by the next cycle.
pub const WINDOW_BACKOFF_MILLIS: i64 = 60_000;

/// Metric type label attached to every dispatched record.
pub const RECORD_TYPE: &str = "records";

/// One `(metric, host, timestamp, value)` data point decoded from a timeline
/// response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub app_id: String,
    pub hostname: String,
    pub metric_name: String,
    pub timestamp_millis: i64,
    pub value: f64,
}

/// The record handed to a sink for each [`Sample`].
///
/// # Examples
///
/// ```
/// use ambmon_common::types::{Sample, ValueList, RECORD_TYPE};
///
/// let sample = Sample {
///     app_id: "HOST".to_string(),
///     hostname: "h1".to_string(),
///     metric_name: "cpu_user".to_string(),
///     timestamp_millis: 1000,
///     value: 0.5,
/// };
/// let values = ValueList::from(sample);
/// assert_eq!(values.plugin, "HOST");
/// assert_eq!(values.type_name, RECORD_TYPE);
/// assert_eq!(values.type_instance, "cpu_user");
/// assert_eq!(values.values, vec![0.5]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueList {
    pub plugin: String,
    pub host: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub type_instance: String,
    pub time_millis: i64,
    pub values: Vec<f64>,
}

impl From<Sample> for ValueList {
    fn from(sample: Sample) -> Self {
        Self {
            plugin: sample.app_id,
            host: sample.hostname,
            type_name: RECORD_TYPE.to_string(),
            type_instance: sample.metric_name,
            time_millis: sample.timestamp_millis,
            values: vec![sample.value],
        }
    }
}

impl ValueList {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.time_millis)
    }
}

/// The half-open interval `[start, end)` queried during one cycle, in epoch
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_millis: i64,
    pub end_millis: i64,
}

/// Start of the next query window, carried from one cycle to the next.
///
/// The start trails the end of the previous cycle by
/// [`WINDOW_BACKOFF_MILLIS`]; the end is always "now" when the cycle begins.
///
/// # Examples
///
/// ```
/// use ambmon_common::types::{SlidingWindow, WINDOW_BACKOFF_MILLIS};
///
/// let window = SlidingWindow::starting_before(100_000);
/// assert_eq!(window.start_millis(), 100_000 - WINDOW_BACKOFF_MILLIS);
///
/// let snapshot = window.snapshot(150_000);
/// assert_eq!(snapshot.start_millis, 40_000);
/// assert_eq!(snapshot.end_millis, 150_000);
///
/// assert_eq!(window.advance(200_000).start_millis(), 140_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingWindow {
    start_millis: i64,
}

impl SlidingWindow {
    /// Window whose start lies one backoff before `now_millis`.
    pub fn starting_before(now_millis: i64) -> Self {
        Self {
            start_millis: now_millis - WINDOW_BACKOFF_MILLIS,
        }
    }

    /// Window anchored on the current wall clock.
    pub fn now() -> Self {
        Self::starting_before(Utc::now().timestamp_millis())
    }

    pub fn start_millis(&self) -> i64 {
        self.start_millis
    }

    /// Freeze the interval used for this cycle's queries.
    pub fn snapshot(&self, now_millis: i64) -> TimeWindow {
        TimeWindow {
            start_millis: self.start_millis,
            end_millis: now_millis,
        }
    }

    /// The window for the following cycle. Independent of the current start.
    pub fn advance(self, now_millis: i64) -> Self {
        Self::starting_before(now_millis)
    }
}
