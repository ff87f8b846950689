use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dynamic value type for node outputs, run inputs and operands.
///
/// Serialized as plain JSON. Objects keep their keys sorted so that the JSON
/// form is stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `Null`, empty text, empty array and empty object are empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }

    /// Tag name as used by the `type_equals` operator.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Follow a dot-separated path of object keys (or array indices).
    ///
    /// Missing keys yield `Null`.
    pub fn get_path(&self, path: &str) -> Value {
        if path.is_empty() {
            return self.clone();
        }
        let mut current = self;
        for segment in path.split('.') {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Value::Null,
            }
        }
        current.clone()
    }

    /// Text form used when a value is substituted into a template.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => {
                serde_json::Value::from(self.clone()).to_string()
            }
        }
    }
}

/// Integral numbers print without a fraction, everything else uses the
/// shortest round-trip form.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    serde_json::Value::from(n as i64)
                } else {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::Text(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_path_nested_and_missing() {
        let value = Value::from(json!({"data": {"name": "Ada", "tags": ["x", "y"]}}));
        assert_eq!(value.get_path("data.name"), Value::from("Ada"));
        assert_eq!(value.get_path("data.tags.1"), Value::from("y"));
        assert_eq!(value.get_path("data.missing"), Value::Null);
        assert_eq!(value.get_path("data.name.deeper"), Value::Null);
    }

    #[test]
    fn test_to_text_canonical() {
        assert_eq!(Value::Number(5.0).to_text(), "5");
        assert_eq!(Value::Number(3.25).to_text(), "3.25");
        assert_eq!(Value::Bool(true).to_text(), "true");
        assert_eq!(Value::Null.to_text(), "");
        let obj = Value::from(json!({"b": 1, "a": [true, null]}));
        assert_eq!(obj.to_text(), r#"{"a":[true,null],"b":1}"#);
    }

    #[test]
    fn test_plain_json_serde() {
        let value: Value = serde_json::from_str(r#"{"count": 2, "ok": true}"#).unwrap();
        assert_eq!(value.get_path("count"), Value::Number(2.0));
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"count":2,"ok":true}"#);
    }

    #[test]
    fn test_is_empty() {
        assert!(Value::Null.is_empty());
        assert!(Value::from("").is_empty());
        assert!(Value::Array(vec![]).is_empty());
        assert!(Value::Object(BTreeMap::new()).is_empty());
        assert!(!Value::Number(0.0).is_empty());
        assert!(!Value::Bool(false).is_empty());
    }
}
