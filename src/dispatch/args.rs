//! Typed access to a JSON argument bag

use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// Arguments of one tool invocation
#[derive(Debug, Clone, Default)]
pub struct Args {
    inner: Map<String, Value>,
}

impl Args {
    pub fn new(inner: Map<String, Value>) -> Self {
        Self { inner }
    }

    /// Accepts an object or `null` (no arguments)
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::new(map)),
            Value::Null => Ok(Self::default()),
            other => Err(ClientError::validation(
                "arguments",
                format!("expected an object, got {}", other),
            )),
        }
    }

    /// Present and not `null`
    fn value(&self, name: &str) -> Option<&Value> {
        self.inner.get(name).filter(|v| !v.is_null())
    }

    pub fn required_str(&self, name: &str) -> Result<String> {
        match self.optional_str(name)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            Some(_) => Err(ClientError::validation(name, "must not be empty")),
            None => Err(ClientError::validation(name, "is required")),
        }
    }

    pub fn optional_str(&self, name: &str) -> Result<Option<String>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(type_error(name, "a string", other)),
        }
    }

    /// Integers may arrive as JSON numbers or numeric strings
    pub fn optional_int(&self, name: &str) -> Result<Option<i64>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| type_error(name, "an integer", &Value::Number(n.clone()))),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| type_error(name, "an integer", &Value::String(s.clone()))),
            Some(other) => Err(type_error(name, "an integer", other)),
        }
    }

    pub fn flag(&self, name: &str) -> Result<bool> {
        self.flag_or(name, false)
    }

    /// Like [`Args::flag`] with a different default when absent
    pub fn flag_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.value(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
            Some(other) => Err(type_error(name, "a boolean", other)),
        }
    }

    /// A list of strings, or one comma-separated string
    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        match self.value(name) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(s
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(type_error(name, "a list of strings", other)),
                })
                .collect(),
            Some(other) => Err(type_error(name, "a list of strings", other)),
        }
    }
}

impl Args {
    pub fn optional_float(&self, name: &str) -> Result<Option<f64>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| type_error(name, "a number", &Value::Number(n.clone()))),
            Some(other) => Err(type_error(name, "a number", other)),
        }
    }

    /// Exactly `N` numbers, e.g. a bounding box
    pub fn floats<const N: usize>(&self, name: &str) -> Result<Option<[f64; N]>> {
        let items = match self.value(name) {
            None => return Ok(None),
            Some(Value::Array(items)) if items.len() == N => items,
            Some(other) => {
                return Err(type_error(name, &format!("a list of {} numbers", N), other))
            }
        };
        let mut out = [0.0; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item
                .as_f64()
                .ok_or_else(|| type_error(name, &format!("a list of {} numbers", N), item))?;
        }
        Ok(Some(out))
    }

    /// Nested argument object
    pub fn object(&self, name: &str) -> Result<Option<Args>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Args::new(map.clone()))),
            Some(other) => Err(type_error(name, "an object", other)),
        }
    }

    /// Argument names, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }
}

fn type_error(name: &str, expected: &str, got: &Value) -> ClientError {
    ClientError::validation(name, format!("expected {}, got {}", expected, got))
}
