use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FieldError;

pub const AUTH_FIELD: &str = "auth";
pub const LENGTH_FIELD: &str = "length";

/// Authentication status carried in the `auth` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthStatus {
    LoggedIn,
    LoggedOut,
    /// Absent, null, or any other string
    Unknown,
}

impl AuthStatus {
    pub fn from_str_value(value: &str) -> Self {
        match value {
            "Logged In" => AuthStatus::LoggedIn,
            "Logged Out" => AuthStatus::LoggedOut,
            _ => AuthStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::LoggedIn => "Logged In",
            AuthStatus::LoggedOut => "Logged Out",
            AuthStatus::Unknown => "unknown",
        }
    }
}

/// Immutable key-value view over one parsed input line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Typed view of `auth`; a non-string value is an error, not `Unknown`
    pub fn auth_status(&self) -> Result<AuthStatus, FieldError> {
        match self.fields.get(AUTH_FIELD) {
            None | Some(Value::Null) => Ok(AuthStatus::Unknown),
            Some(Value::String(s)) => Ok(AuthStatus::from_str_value(s)),
            Some(other) => Err(FieldError::TypeMismatch {
                field: AUTH_FIELD,
                expected: "string",
                found: json_type_name(other),
            }),
        }
    }

    /// Typed view of `length`; any JSON number counts, other types are errors
    pub fn length(&self) -> Result<Option<f64>, FieldError> {
        match self.fields.get(LENGTH_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(other) => Err(FieldError::TypeMismatch {
                field: LENGTH_FIELD,
                expected: "number",
                found: json_type_name(other),
            }),
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
