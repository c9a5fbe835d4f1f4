use crate::error::DecodeError;
use ambmon_common::types::Sample;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    metrics: Vec<TimelineMetric>,
}

#[derive(Debug, Deserialize)]
struct TimelineMetric {
    hostname: String,
    metricname: String,
    metrics: Map<String, Value>,
}

/// Decode a timeline response body into samples tagged with `app_id`.
///
/// Samples come out in payload order: outer `metrics` array first, then the
/// nested timestamp object. Nothing here sorts by timestamp.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] if the body is not JSON of the expected
/// shape, and [`DecodeError::InvalidTimestamp`] or
/// [`DecodeError::NonNumericValue`] if a nested entry cannot be read.
pub fn decode(body: &str, app_id: &str) -> Result<Vec<Sample>, DecodeError> {
    let response: TimelineResponse = serde_json::from_str(body)?;

    let mut samples = Vec::new();
    for metric in response.metrics {
        for (key, value) in &metric.metrics {
            let timestamp_millis = key.parse::<i64>().map_err(|_| DecodeError::InvalidTimestamp {
                hostname: metric.hostname.clone(),
                metric: metric.metricname.clone(),
                key: key.clone(),
            })?;
            let value = numeric(value).ok_or_else(|| DecodeError::NonNumericValue {
                hostname: metric.hostname.clone(),
                metric: metric.metricname.clone(),
                timestamp: timestamp_millis,
            })?;

            samples.push(Sample {
                app_id: app_id.to_string(),
                hostname: metric.hostname.clone(),
                metric_name: metric.metricname.clone(),
                timestamp_millis,
                value,
            });
        }
    }

    Ok(samples)
}

/// JSON numbers, or strings holding one (`"0.5"`).
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
