//! Values, declared parameter types and parameters.
//!
//! `Value` is the driver-independent representation used both for bound
//! parameters and for decoded result columns.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A database value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    /// Stored as i64 for maximum range
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(JsonValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether a nullable parameter should bind this value as the driver null.
    ///
    /// Empty text counts as absent; whitespace does not.
    pub fn is_null_or_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }

    /// Render as JSON. Bytes become base64 strings.
    pub fn to_json(&self) -> JsonValue {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Int(v) => JsonValue::Number((*v).into()),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string())),
            Self::Text(v) => JsonValue::String(v.clone()),
            Self::Bytes(v) => JsonValue::String(STANDARD.encode(v)),
            Self::Json(v) => v.clone(),
        }
    }

    /// Convert into a typed Rust value.
    pub fn get<T: FromValue>(&self) -> Result<T> {
        T::from_value(self)
    }
}

impl From<JsonValue> for Value {
    /// JSON scalars map onto the matching variant; arrays and objects stay JSON.
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident via $conv:expr),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant($conv(v))
                }
            }
        )+
    };
}

impl_value_from! {
    bool => Bool via |v| v,
    i16 => Int via i64::from,
    i32 => Int via i64::from,
    i64 => Int via |v| v,
    u8 => Int via i64::from,
    u16 => Int via i64::from,
    u32 => Int via i64::from,
    f32 => Float via f64::from,
    f64 => Float via |v| v,
    String => Text via |v| v,
    &str => Text via String::from,
    Vec<u8> => Bytes via |v| v,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Conversion from a database [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch<T>(value: &Value, target: &str) -> Result<T> {
    Err(Error::mapping(format!(
        "cannot convert {} value to {}",
        value.type_name(),
        target
    )))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(v) => Ok(*v),
            Value::Bool(v) => Ok(i64::from(*v)),
            Value::Float(v) if v.fract() == 0.0 => Ok(*v as i64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::mapping(format!("'{s}' is not an integer"))),
            other => mismatch(other, "i64"),
        }
    }
}

macro_rules! impl_from_value_narrow_int {
    ($($ty:ty),+) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    let wide = i64::from_value(value)?;
                    <$ty>::try_from(wide).map_err(|_| {
                        Error::mapping(format!("{} is out of range for {}", wide, stringify!($ty)))
                    })
                }
            }
        )+
    };
}

impl_from_value_narrow_int!(i16, i32, u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::mapping(format!("'{s}' is not a number"))),
            other => mismatch(other, "f64"),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(*v),
            Value::Int(v) => Ok(*v != 0),
            Value::Text(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::Text(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => mismatch(other, "bool"),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Int(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            Value::Bool(v) => Ok(v.to_string()),
            Value::Json(v) => Ok(v.to_string()),
            other => mismatch(other, "String"),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(v) => Ok(v.clone()),
            Value::Text(s) => Ok(s.clone().into_bytes()),
            other => mismatch(other, "Vec<u8>"),
        }
    }
}

impl FromValue for JsonValue {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone()))),
            other => Ok(other.to_json()),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Declared parameter type. Decides how a null is typed when bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbType {
    AnsiString,
    String,
    Boolean,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Binary,
    Json,
}

impl DbType {
    /// Pick a declared type for an untyped value.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null | Value::Text(_) => Self::String,
            Value::Bool(_) => Self::Boolean,
            Value::Int(_) => Self::Int64,
            Value::Float(_) => Self::Double,
            Value::Bytes(_) => Self::Binary,
            Value::Json(_) => Self::Json,
        }
    }
}

/// A named, typed command parameter.
///
/// Parameters bind positionally in the order they were added; the name is
/// carried for hooks and logging.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
    pub db_type: DbType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            db_type,
        }
    }

    /// Build a parameter that binds the driver null for absent or empty values.
    pub fn nullable(name: impl Into<String>, value: impl Into<Value>, db_type: DbType) -> Self {
        let value = value.into();
        let value = if value.is_null_or_empty() {
            Value::Null
        } else {
            value
        };
        Self::new(name, value, db_type)
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}
