//! Scalar Values
//!
//! Every key in TallyKV holds exactly one scalar: a string, a 64-bit signed
//! integer or a 64-bit float. Raw text coming off the wire is coerced into
//! the narrowest variant that parses the *whole* input:
//!
//! ```text
//! "42"    -> Integer(42)
//! "4.2"   -> Float(4.2)
//! "1e3"   -> Float(1000.0)
//! "42abc" -> String("42abc")
//! "nan"   -> String("nan")
//! ```
//!
//! Only finite floats are accepted, so `nan`/`inf` stay plain strings.

use std::fmt;

/// A tagged scalar stored under a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Opaque text, never takes part in arithmetic
    String(String),
    /// Signed 64-bit integer
    Integer(i64),
    /// Finite 64-bit float
    Float(f64),
}

impl Value {
    /// Coerces raw text into a value: integer, then float, then string.
    ///
    /// # Example
    ///
    /// ```
    /// use tallykv::storage::Value;
    ///
    /// assert_eq!(Value::coerce("5"), Value::Integer(5));
    /// assert_eq!(Value::coerce("2.5"), Value::Float(2.5));
    /// assert_eq!(Value::coerce("five"), Value::String("five".to_string()));
    /// ```
    pub fn coerce(raw: &str) -> Self {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Integer(n);
        }
        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::String(raw.to_string()),
        }
    }

    /// Returns the numeric view of this value, or `None` for strings.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::String(_) => None,
        }
    }

    /// Name of the active variant, used in log lines.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{}", n),
            // 6.0 prints as "6", 1.5 as "1.5"
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<&str> for Value {
    fn from(raw: &str) -> Self {
        Value::coerce(raw)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}
