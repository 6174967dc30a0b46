use std::ffi::OsStr;
use std::sync::Arc;

use clap::builder::{PossibleValue, TypedValueParser};
use clap::error::ErrorKind;
use clap::{Arg, Command};
use runbook_core::display_literal;
use runbook_validators::LeafValidator;
use serde_json::Value;

/// Converts one raw occurrence through an optional leaf validator, then
/// checks it against the declared choices.
#[derive(Clone)]
pub struct LeafValueParser {
    validator: Option<Arc<dyn LeafValidator>>,
    choices: Option<Vec<Value>>,
}

impl std::fmt::Debug for LeafValueParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafValueParser")
            .field("validator", &self.validator.as_ref().map(|v| v.name()))
            .field("choices", &self.choices)
            .finish()
    }
}

impl LeafValueParser {
    pub fn new(validator: Option<Arc<dyn LeafValidator>>, choices: Option<Vec<Value>>) -> Self {
        Self { validator, choices }
    }

    fn matching_choice(&self, raw: &str, value: Value) -> Option<Value> {
        let Some(choices) = &self.choices else {
            return Some(value);
        };
        if let Some(choice) = choices.iter().find(|choice| **choice == value) {
            return Some(choice.clone());
        }
        // Untyped input is a string; let it select a numeric or boolean literal.
        if self.validator.is_none() {
            return choices
                .iter()
                .find(|choice| !choice.is_string() && choice.to_string() == raw)
                .cloned();
        }
        None
    }
}

fn invalid_value(cmd: &Command, arg: Option<&Arg>, message: String) -> clap::Error {
    let prefix = arg
        .map(|arg| format!("argument {arg}: "))
        .unwrap_or_default();
    clap::Error::raw(ErrorKind::ValueValidation, format!("{prefix}{message}\n")).with_cmd(cmd)
}

impl TypedValueParser for LeafValueParser {
    type Value = Value;

    fn parse_ref(
        &self,
        cmd: &Command,
        arg: Option<&Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let raw = value
            .to_str()
            .ok_or_else(|| clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd))?;
        let converted = match &self.validator {
            Some(validator) => validator
                .validate(raw)
                .map_err(|error| invalid_value(cmd, arg, error.to_string()))?,
            None => Value::String(raw.to_string()),
        };
        self.matching_choice(raw, converted).ok_or_else(|| {
            let choices = self
                .choices
                .iter()
                .flatten()
                .map(|choice| format!("'{}'", display_literal(choice)))
                .collect::<Vec<_>>()
                .join(", ");
            invalid_value(
                cmd,
                arg,
                format!("invalid choice: '{raw}' (choose from {choices})"),
            )
        })
    }

    fn possible_values(&self) -> Option<Box<dyn Iterator<Item = PossibleValue> + '_>> {
        let choices = self.choices.as_ref()?;
        Some(Box::new(
            choices
                .iter()
                .map(|choice| PossibleValue::new(display_literal(choice))),
        ))
    }
}
