// src/services/normalizer.rs
use crate::errors::TubeMasterError;
use serde_json::Value;

/// Pulls the JSON object out of a model reply that may be fenced or wrapped
/// in prose. Returns `{}` when there is no brace pair at all.
pub fn extract_json(text: &str) -> &str {
    let mut clean = text.trim();
    if let Some(rest) = clean.strip_prefix("```json") {
        clean = rest;
    } else if let Some(rest) = clean.strip_prefix("```") {
        clean = rest;
    }
    if let Some(rest) = clean.trim_end().strip_suffix("```") {
        clean = rest;
    }

    match (clean.find('{'), clean.rfind('}')) {
        (Some(first), Some(last)) if last > first => &clean[first..=last],
        _ => "{}",
    }
}

/// Loosely typed model output with default-on-absence accessors.
#[derive(Debug, Clone)]
pub struct RawModelResult(Value);

impl RawModelResult {
    pub fn parse(text: &str) -> Result<Self, TubeMasterError> {
        let value: Value = serde_json::from_str(extract_json(text)).map_err(|e| {
            TubeMasterError::MalformedResponse(format!("Failed to parse model JSON: {}", e))
        })?;
        Ok(Self(value))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str_or_default(&self, key: &str) -> String {
        self.0[key].as_str().unwrap_or_default().to_string()
    }

    /// Numbers and numeric strings are accepted; anything else is 0.
    pub fn number_or_zero(&self, key: &str) -> f64 {
        number_or_zero(&self.0[key])
    }

    pub fn array(&self, key: &str) -> &[Value] {
        self.0[key].as_array().map(Vec::as_slice).unwrap_or_default()
    }

    /// `{key: [...]}` or a bare top-level array.
    pub fn list(&self, key: &str) -> &[Value] {
        match (&self.0[key], &self.0) {
            (Value::Array(items), _) => items.as_slice(),
            (_, Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }
}

/// Non-finite values such as `"NaN"` or `"inf"` are also 0.
pub fn number_or_zero(value: &Value) -> f64 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|n: &f64| n.is_finite()).unwrap_or(0.0)
}
