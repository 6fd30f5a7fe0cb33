//! Flag validation: the [`FlagsValidator`] seam and two implementations.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

use crate::Flags;
use crate::args::PASSTHROUGH_KEY;
use crate::error::FieldError;

/// Validates and types the raw flags of one command.
pub trait FlagsValidator: Send + Sync {
    /// Typed flags, or every field-level problem found.
    fn validate(&self, raw: &Flags) -> Result<Flags, Vec<FieldError>>;

    /// Problems with the flags typed after the command itself.
    ///
    /// `given` excludes global flags and the configuration and environment
    /// layers, which may carry keys meant for other commands.
    fn check_given(&self, _given: &Flags) -> Vec<FieldError> {
        Vec::new()
    }

    /// Flag documentation for help output.
    fn fields(&self) -> Vec<FlagDoc> {
        Vec::new()
    }
}

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    String,
    Boolean,
    Integer,
    Number,
}

impl FlagKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlagKind::String => "string",
            FlagKind::Boolean => "boolean",
            FlagKind::Integer => "integer",
            FlagKind::Number => "number",
        }
    }
}

/// Help entry for one flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagDoc {
    pub name: String,
    pub kind: FlagKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One declared field of a [`FlagSchema`].
#[derive(Debug, Clone)]
pub struct FlagField {
    name: String,
    kind: FlagKind,
    required: bool,
    default: Option<Value>,
    description: Option<String>,
}

impl FlagField {
    fn new(name: impl Into<String>, kind: FlagKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::Boolean)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::Number)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value used when the flag is absent. A field with a default is never
    /// reported as missing.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    fn doc(&self) -> FlagDoc {
        FlagDoc {
            name: self.name.clone(),
            kind: self.kind,
            required: self.required,
            default: self.default.clone(),
            description: self.description.clone(),
        }
    }
}

/// Declarative flag schema.
///
/// String values coming from the command line are coerced to the declared
/// type. Keys the schema does not declare pass through untouched; a
/// [`strict`](FlagSchema::strict) schema rejects undeclared command-line
/// flags.
#[derive(Debug, Clone, Default)]
pub struct FlagSchema {
    fields: Vec<FlagField>,
    strict: bool,
}

impl FlagSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FlagField) -> Self {
        self.fields.push(field);
        self
    }

    /// Reject undeclared flags given on the command line.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

impl FlagsValidator for FlagSchema {
    fn validate(&self, raw: &Flags) -> Result<Flags, Vec<FieldError>> {
        let mut typed = raw.clone();
        let mut errors = Vec::new();

        for field in &self.fields {
            match raw.get(&field.name) {
                Some(value) => match coerce(field.kind, value) {
                    Ok(value) => {
                        typed.insert(field.name.clone(), value);
                    }
                    Err(message) => errors.push(FieldError::new(&field.name, message)),
                },
                None => match &field.default {
                    Some(default) => {
                        typed.insert(field.name.clone(), default.clone());
                    }
                    None if field.required => {
                        errors.push(FieldError::new(&field.name, "is required"));
                    }
                    None => {}
                },
            }
        }

        if errors.is_empty() {
            Ok(typed)
        } else {
            Err(errors)
        }
    }

    fn check_given(&self, given: &Flags) -> Vec<FieldError> {
        if !self.strict {
            return Vec::new();
        }
        given
            .keys()
            .filter(|key| *key != PASSTHROUGH_KEY && !self.fields.iter().any(|f| &f.name == *key))
            .map(|key| FieldError::new(key, "unknown flag"))
            .collect()
    }

    fn fields(&self) -> Vec<FlagDoc> {
        self.fields.iter().map(FlagField::doc).collect()
    }
}

fn coerce(kind: FlagKind, value: &Value) -> Result<Value, String> {
    match kind {
        FlagKind::String => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err("expected a string".to_string()),
        },
        FlagKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(format!("expected a boolean, got '{s}'")),
            },
            _ => Err("expected a boolean".to_string()),
        },
        FlagKind::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected an integer, got '{s}'")),
            _ => Err("expected an integer".to_string()),
        },
        FlagKind::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("expected a number, got '{s}'")),
            _ => Err("expected a number".to_string()),
        },
    }
}

/// Validator backed by a serde type.
///
/// The raw map is deserialized into `T` and the typed value serialized back
/// as the flags the handler receives, so defaults and renames declared with
/// serde attributes apply.
pub struct SerdeFlags<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeFlags<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeFlags<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SerdeFlags<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerdeFlags")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> FlagsValidator for SerdeFlags<T>
where
    T: DeserializeOwned + Serialize,
{
    fn validate(&self, raw: &Flags) -> Result<Flags, Vec<FieldError>> {
        let typed: T = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| vec![serde_field_error(&e)])?;

        match serde_json::to_value(&typed) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(vec![FieldError::new(
                "flags",
                "validated flags must serialize to a mapping",
            )]),
            Err(e) => Err(vec![FieldError::new("flags", e.to_string())]),
        }
    }
}

/// Map a serde error onto the field it names, when it names one.
fn serde_field_error(err: &serde_json::Error) -> FieldError {
    let message = err.to_string();
    let field = ["missing field `", "unknown field `"]
        .iter()
        .find_map(|prefix| message.strip_prefix(prefix))
        .and_then(|rest| rest.split('`').next())
        .unwrap_or("flags");
    FieldError::new(field, message.clone())
}
