use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maps one wire field onto one tracked metric key.
///
/// `source` may be a dotted path (`gpu.util`) into nested objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub default: f64,
}

impl FieldMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            default: 0.0,
        }
    }

    /// Wire name and metric key are the same.
    pub fn same(name: &str) -> Self {
        Self::new(name, name)
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    /// Reads the mapped value from one wire object, falling back to the
    /// default when the field is absent, null or not numeric.
    pub fn read(&self, object: &Map<String, Value>) -> f64 {
        lookup(object, &self.source)
            .and_then(read_number)
            .unwrap_or(self.default)
    }
}

pub(crate) fn lookup<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = object.get(path) {
        return Some(value);
    }

    let mut parts = path.split('.');
    let mut current = object.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

pub(crate) fn read_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
