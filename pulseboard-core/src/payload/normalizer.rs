use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PulseboardError, PulseboardResult};
use crate::models::{MetricSample, RunStatus};

use super::mapping::{lookup, FieldMapping};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// Samples extracted from one response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedPayload {
    pub samples: Vec<MetricSample>,
    pub status: Option<RunStatus>,
}

impl NormalizedPayload {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.status.as_ref().is_some_and(RunStatus::is_finished)
    }
}

/// Turns any of the supported wire shapes into a sample sequence.
///
/// Accepted shapes: a single sample object, an array of sample objects, or
/// an envelope object whose `samples_field` holds the array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub samples_field: Option<String>,
    #[serde(default)]
    pub timestamp_field: Option<String>,
    #[serde(default)]
    pub label_field: Option<String>,
    #[serde(default)]
    pub status_field: Option<String>,
}

impl Normalizer {
    pub fn new(mappings: Vec<FieldMapping>) -> Self {
        Self {
            mappings,
            samples_field: None,
            timestamp_field: None,
            label_field: None,
            status_field: None,
        }
    }

    pub fn with_samples_field(mut self, field: impl Into<String>) -> Self {
        self.samples_field = Some(field.into());
        self
    }

    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = Some(field.into());
        self
    }

    pub fn with_label_field(mut self, field: impl Into<String>) -> Self {
        self.label_field = Some(field.into());
        self
    }

    pub fn with_status_field(mut self, field: impl Into<String>) -> Self {
        self.status_field = Some(field.into());
        self
    }

    /// Metric keys this normalizer produces, in mapping order.
    pub fn targets(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(self.mappings.len());
        for mapping in &self.mappings {
            if !keys.contains(&mapping.target) {
                keys.push(mapping.target.clone());
            }
        }
        keys
    }

    /// Parses a raw response body.
    pub fn parse_body(&self, body: &str, received_at: DateTime<Utc>) -> PulseboardResult<NormalizedPayload> {
        if body.trim().is_empty() {
            return Err(PulseboardError::EmptyPayload);
        }
        let value: Value = serde_json::from_str(body)?;
        self.normalize(&value, received_at)
    }

    /// `received_at` stamps samples that carry no usable timestamp.
    pub fn normalize(&self, payload: &Value, received_at: DateTime<Utc>) -> PulseboardResult<NormalizedPayload> {
        match payload {
            Value::Array(items) => Ok(NormalizedPayload {
                samples: self.samples_from(items, received_at)?,
                status: None,
            }),
            Value::Object(object) => self.normalize_object(object, received_at),
            Value::Null => Err(PulseboardError::EmptyPayload),
            other => Err(PulseboardError::UnexpectedShape(format!(
                "expected an object or array, got {}",
                json_type(other)
            ))),
        }
    }

    fn normalize_object(
        &self,
        object: &Map<String, Value>,
        received_at: DateTime<Utc>,
    ) -> PulseboardResult<NormalizedPayload> {
        let status = self
            .status_field
            .as_deref()
            .and_then(|f| object.get(f))
            .and_then(Value::as_str)
            .map(RunStatus::parse);

        let Some(field) = self.samples_field.as_deref() else {
            return Ok(NormalizedPayload {
                samples: vec![self.sample_from(object, received_at)],
                status,
            });
        };

        let samples = match object.get(field) {
            Some(Value::Array(items)) => self.samples_from(items, received_at)?,
            Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(PulseboardError::UnexpectedShape(format!(
                    "field '{}' should be an array, got {}",
                    field,
                    json_type(other)
                )))
            }
            None => {
                return Err(PulseboardError::UnexpectedShape(format!(
                    "envelope is missing field '{}'",
                    field
                )))
            }
        };

        Ok(NormalizedPayload { samples, status })
    }

    fn samples_from(&self, items: &[Value], received_at: DateTime<Utc>) -> PulseboardResult<Vec<MetricSample>> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(object) => Ok(self.sample_from(object, received_at)),
                other => Err(PulseboardError::UnexpectedShape(format!(
                    "element {} should be an object, got {}",
                    index,
                    json_type(other)
                ))),
            })
            .collect()
    }

    fn sample_from(&self, object: &Map<String, Value>, received_at: DateTime<Utc>) -> MetricSample {
        let timestamp = self
            .timestamp_field
            .as_deref()
            .and_then(|f| lookup(object, f))
            .and_then(parse_timestamp)
            .unwrap_or(received_at);

        let mut sample = MetricSample::new(timestamp);

        if let Some(label) = self
            .label_field
            .as_deref()
            .and_then(|f| lookup(object, f))
            .and_then(Value::as_str)
        {
            sample.label = Some(label.to_string());
        }

        for mapping in &self.mappings {
            sample
                .values
                .insert(mapping.target.clone(), mapping.read(object));
        }

        sample
    }
}

/// Accepts epoch seconds or milliseconds, RFC 3339, or naive ISO-8601
/// (read as UTC).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let raw = n.as_f64()?;
            if !raw.is_finite() || raw < 0.0 {
                return None;
            }
            let millis = if raw > EPOCH_MILLIS_THRESHOLD {
                raw
            } else {
                raw * 1000.0
            };
            DateTime::from_timestamp_millis(millis.round() as i64)
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
