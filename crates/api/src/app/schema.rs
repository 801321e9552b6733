//! Request validation: JSON body schemas and the listing query string.
//!
//! Validation collects every problem before failing, keyed by field name, so a
//! client sees all of them in one 422 response. Body-level problems (the body
//! is not an object) are reported under [`SCHEMA_KEY`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use roster_core::CollectionParams;

/// Field name → messages. Ordered so responses are stable.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const SCHEMA_KEY: &str = "_schema";

pub const MISSING: &str = "Missing data for required field.";
pub const NULL: &str = "Field may not be null.";
pub const UNKNOWN: &str = "Unknown field.";
pub const INVALID_INPUT: &str = "Invalid input type.";
pub const NOT_STRING: &str = "Not a valid string.";
pub const NOT_INTEGER: &str = "Not a valid integer.";
pub const NOT_BOOLEAN: &str = "Not a valid boolean.";
pub const NOT_EMAIL: &str = "Not a valid email address.";
pub const NEGATIVE: &str = "Must be greater than or equal to 0.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Email,
    Integer,
    Boolean,
    /// A string restricted to the listed names.
    Choice(&'static [&'static str]),
}

impl FieldKind {
    fn check(self, value: &Value) -> Result<(), String> {
        match self {
            Self::String => value.as_str().map(|_| ()).ok_or_else(|| NOT_STRING.to_string()),
            Self::Email => match value.as_str() {
                Some(s) if is_email(s) => Ok(()),
                Some(_) => Err(NOT_EMAIL.to_string()),
                None => Err(NOT_STRING.to_string()),
            },
            Self::Integer => value.as_i64().map(|_| ()).ok_or_else(|| NOT_INTEGER.to_string()),
            Self::Boolean => value.as_bool().map(|_| ()).ok_or_else(|| NOT_BOOLEAN.to_string()),
            Self::Choice(choices) => match value.as_str() {
                Some(s) if choices.contains(&s) => Ok(()),
                Some(_) => Err(format!("Must be one of: {}.", choices.join(", "))),
                None => Err(NOT_STRING.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl Field {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Declared fields of one request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub fields: &'static [Field],
}

impl Schema {
    pub const fn new(fields: &'static [Field]) -> Self {
        Self { fields }
    }

    fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validate(&self, body: Value) -> Result<ValidBody, FieldErrors> {
        let Value::Object(map) = body else {
            return Err(single_error(SCHEMA_KEY, INVALID_INPUT));
        };

        let mut errors = FieldErrors::new();
        for key in map.keys() {
            if self.field(key).is_none() {
                push_error(&mut errors, key, UNKNOWN);
            }
        }

        for field in self.fields {
            match map.get(field.name) {
                None if field.required => push_error(&mut errors, field.name, MISSING),
                None => {}
                Some(Value::Null) => push_error(&mut errors, field.name, NULL),
                Some(value) => {
                    if let Err(message) = field.kind.check(value) {
                        push_error(&mut errors, field.name, message);
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(ValidBody(map))
        } else {
            Err(errors)
        }
    }
}

/// A body that passed [`Schema::validate`]; accessors return `None` for omitted fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidBody(Map<String, Value>);

impl ValidBody {
    pub fn string(&self, name: &str) -> Option<String> {
        self.0.get(name).and_then(Value::as_str).map(str::to_owned)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }
}

/// Parse listing query pairs. Unrecognised keys are ignored.
pub fn collection_params(query: &[(String, String)]) -> Result<CollectionParams, FieldErrors> {
    let mut params = CollectionParams::default();
    let mut errors = FieldErrors::new();

    for (key, value) in query {
        match key.as_str() {
            "search" => params.search.push(value.clone()),
            "sorting" if value.is_empty() => params.sorting = None,
            "sorting" => params.sorting = Some(value.clone()),
            "page" => match non_negative(value) {
                Ok(n) => params.page = Some(n),
                Err(message) => push_error(&mut errors, "page", message),
            },
            "size" => match non_negative(value) {
                Ok(n) => params.size = Some(n),
                Err(message) => push_error(&mut errors, "size", message),
            },
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(params)
    } else {
        Err(errors)
    }
}

fn non_negative(raw: &str) -> Result<u64, &'static str> {
    let n: i64 = raw.trim().parse().map_err(|_| NOT_INTEGER)?;
    u64::try_from(n).map_err(|_| NEGATIVE)
}

pub fn single_error(field: &str, message: impl Into<String>) -> FieldErrors {
    let mut errors = FieldErrors::new();
    push_error(&mut errors, field, message);
    errors
}

fn push_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    let message = message.into();
    let messages = errors.entry(field.to_string()).or_default();
    if !messages.contains(&message) {
        messages.push(message);
    }
}

/// Syntactic address check: one `@`, a non-empty local part, and a dotted
/// domain of alphanumeric/hyphen labels (or `localhost`).
fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if domain == "localhost" {
        return true;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}
