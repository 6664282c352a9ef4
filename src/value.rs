//! Scalar values stored in a parameter study.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single parameter value.
///
/// Parameter studies may mix numeric and textual parameters, so every cell of the
/// sample table carries its own type. Two values are only considered the same content
/// when both the type and the value agree: `1` and `1.0` are different values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Boolean flag.
    Boolean(bool),
    /// Signed integer.
    Integer(i64),
    /// Double precision float.
    Float(f64),
    /// Free text.
    Text(String),
}

impl ParameterValue {
    /// Short name of the value type, used in canonical serializations.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "bool",
            Self::Integer(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "str",
        }
    }

    /// Unambiguous textual representation of the value.
    ///
    /// Floats always keep a decimal point and text is quoted, so the representation of
    /// one type can never collide with another.
    ///
    /// # Examples
    /// ```
    /// use waves::ParameterValue;
    ///
    /// assert_eq!(ParameterValue::Float(1.0).canonical(), "1.0");
    /// assert_eq!(ParameterValue::Text("1".into()).canonical(), "\"1\"");
    /// ```
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Boolean(value) => value.to_string(),
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => format!("{value:?}"),
            Self::Text(value) => format!("{value:?}"),
        }
    }

    /// Numeric view of the value, if it has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Boolean(_) | Self::Text(_) => None,
        }
    }

    /// Convert a YAML scalar into a parameter value.
    ///
    /// Returns `None` for sequences, mappings, tagged values and nulls.
    #[must_use]
    pub fn from_yaml(value: &serde_yaml::Value) -> Option<Self> {
        match value {
            serde_yaml::Value::Bool(flag) => Some(Self::Boolean(*flag)),
            serde_yaml::Value::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    Some(Self::Integer(integer))
                } else {
                    number.as_f64().map(Self::Float)
                }
            }
            serde_yaml::Value::String(text) => Some(Self::Text(text.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_distinguishes_types() {
        let integer = ParameterValue::Integer(1);
        let float = ParameterValue::Float(1.0);
        let text = ParameterValue::Text("1".to_string());
        assert_eq!(integer.canonical(), "1");
        assert_eq!(float.canonical(), "1.0");
        assert_eq!(text.canonical(), "\"1\"");
        assert_ne!(integer, float);
    }

    #[test]
    fn yaml_scalars_keep_their_type() {
        let parsed: serde_yaml::Value =
            serde_yaml::from_str("[1, 1.5, true, name, [2]]").expect("valid yaml");
        let values: Vec<Option<ParameterValue>> = parsed
            .as_sequence()
            .expect("sequence")
            .iter()
            .map(ParameterValue::from_yaml)
            .collect();
        assert_eq!(
            values,
            vec![
                Some(ParameterValue::Integer(1)),
                Some(ParameterValue::Float(1.5)),
                Some(ParameterValue::Boolean(true)),
                Some(ParameterValue::Text("name".to_string())),
                None,
            ]
        );
    }

    #[test]
    fn json_round_trip_keeps_integer_and_float_apart() {
        let values = vec![ParameterValue::Integer(2), ParameterValue::Float(2.0)];
        let text = serde_json::to_string(&values).expect("serializable");
        assert_eq!(text, "[2,2.0]");
        let back: Vec<ParameterValue> = serde_json::from_str(&text).expect("deserializable");
        assert_eq!(back, values);
    }
}
