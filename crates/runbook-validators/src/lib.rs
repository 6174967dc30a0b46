//! Leaf value validators referenced by a variable's `type` field.
//!
//! Each validator is a stateless predicate that turns one raw command-line
//! string into a typed JSON value or rejects it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

const FQDN_PATTERN: &str = r"\A(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])\.)*([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-]*[A-Za-z0-9])\z";
const HTTP_URL_PATTERN: &str = r"(?i)\Ahttps?://.*\z";

/// Error returned when a value or a validator lookup fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeafValueError {
    #[error("invalid {type_name} value: '{raw}'")]
    Rejected { type_name: String, raw: String },
    #[error("unknown value type '{0}'")]
    UnknownType(String),
    #[error("invalid pattern for value type '{type_name}': {message}")]
    Pattern { type_name: String, message: String },
}

impl LeafValueError {
    fn rejected(type_name: &str, raw: &str) -> Self {
        Self::Rejected {
            type_name: type_name.to_string(),
            raw: raw.to_string(),
        }
    }
}

/// Trait contract for named value validators.
pub trait LeafValidator: Send + Sync {
    fn name(&self) -> &str;
    fn validate(&self, raw: &str) -> Result<Value, LeafValueError>;
}

/// Accepts `true`/`1` and `false`/`0`, case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanValidator;

impl LeafValidator for BooleanValidator {
    fn name(&self) -> &str {
        "Boolean"
    }

    fn validate(&self, raw: &str) -> Result<Value, LeafValueError> {
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(LeafValueError::rejected(self.name(), raw)),
        }
    }
}

/// Accepts absolute paths and returns them normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsolutePathValidator;

impl LeafValidator for AbsolutePathValidator {
    fn name(&self) -> &str {
        "AbsolutePath"
    }

    fn validate(&self, raw: &str) -> Result<Value, LeafValueError> {
        let path = Path::new(raw);
        if !path.is_absolute() {
            return Err(LeafValueError::rejected(self.name(), raw));
        }
        let normalized = path.components().collect::<PathBuf>();
        Ok(Value::String(normalized.to_string_lossy().into_owned()))
    }
}

/// Accepts paths of existing regular files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileValidator;

impl LeafValidator for FileValidator {
    fn name(&self) -> &str {
        "File"
    }

    fn validate(&self, raw: &str) -> Result<Value, LeafValueError> {
        if Path::new(raw).is_file() {
            Ok(Value::String(raw.to_string()))
        } else {
            Err(LeafValueError::rejected(self.name(), raw))
        }
    }
}

/// Accepts integers strictly between 0 and 65535.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortValidator;

impl LeafValidator for PortValidator {
    fn name(&self) -> &str {
        "Port"
    }

    fn validate(&self, raw: &str) -> Result<Value, LeafValueError> {
        match raw.trim().parse::<i64>() {
            Ok(port) if 0 < port && port < 65535 => Ok(Value::from(port)),
            _ => Err(LeafValueError::rejected(self.name(), raw)),
        }
    }
}

/// Accepts strings matching a regular expression.
#[derive(Debug, Clone)]
pub struct RegexValidator {
    name: String,
    pattern: Regex,
}

impl RegexValidator {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, LeafValueError> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|error| LeafValueError::Pattern {
            type_name: name.clone(),
            message: error.to_string(),
        })?;
        Ok(Self { name, pattern })
    }
}

impl LeafValidator for RegexValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, raw: &str) -> Result<Value, LeafValueError> {
        if self.pattern.is_match(raw) {
            Ok(Value::String(raw.to_string()))
        } else {
            Err(LeafValueError::rejected(&self.name, raw))
        }
    }
}

/// Validators addressable by name.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: BTreeMap<String, Arc<dyn LeafValidator>>,
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ValidatorRegistry {
    /// Registry with `Boolean`, `AbsolutePath`, `File`, `Port`, `FQDN` and `HTTPUrl`.
    pub fn builtin() -> Result<Self, LeafValueError> {
        let mut registry = Self::default();
        registry.register(Arc::new(BooleanValidator));
        registry.register(Arc::new(AbsolutePathValidator));
        registry.register(Arc::new(FileValidator));
        registry.register(Arc::new(PortValidator));
        registry.register(Arc::new(RegexValidator::new("FQDN", FQDN_PATTERN)?));
        registry.register(Arc::new(RegexValidator::new("HTTPUrl", HTTP_URL_PATTERN)?));
        Ok(registry)
    }

    /// Registers `validator`, replacing any previous one with the same name.
    pub fn register(&mut self, validator: Arc<dyn LeafValidator>) {
        self.validators
            .insert(validator.name().to_string(), validator);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn LeafValidator>, LeafValueError> {
        self.validators
            .get(name)
            .cloned()
            .ok_or_else(|| LeafValueError::UnknownType(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }
}
