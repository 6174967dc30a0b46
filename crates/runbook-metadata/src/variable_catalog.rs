use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use serde_json::Value;

/// Identifier metadata uses to select the append-unique list behavior.
pub const APPEND_UNIQUE_ACTION: &str = "append_unique";
/// Identifier metadata uses to select the remove list behavior.
pub const REMOVE_ACTION: &str = "remove";

const RESET_FLAG_PREFIX: &str = "--reset-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// How repeated occurrences of a variable fold into its value.
pub enum VariableAction {
    #[default]
    Store,
    Append,
    AppendUnique,
    Remove,
    StoreTrue,
    StoreFalse,
    AppendConst,
    Count,
}

impl VariableAction {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableAction::Store => "store",
            VariableAction::Append => "append",
            VariableAction::AppendUnique => APPEND_UNIQUE_ACTION,
            VariableAction::Remove => REMOVE_ACTION,
            VariableAction::StoreTrue => "store_true",
            VariableAction::StoreFalse => "store_false",
            VariableAction::AppendConst => "append_const",
            VariableAction::Count => "count",
        }
    }

    /// Whether each occurrence consumes one value from the command line.
    pub fn takes_value(self) -> bool {
        matches!(
            self,
            VariableAction::Store
                | VariableAction::Append
                | VariableAction::AppendUnique
                | VariableAction::Remove
        )
    }
}

impl FromStr for VariableAction {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        let action = match normalized.as_str() {
            "store" => VariableAction::Store,
            "append" => VariableAction::Append,
            APPEND_UNIQUE_ACTION => VariableAction::AppendUnique,
            REMOVE_ACTION => VariableAction::Remove,
            "store_true" => VariableAction::StoreTrue,
            "store_false" => VariableAction::StoreFalse,
            "append_const" => VariableAction::AppendConst,
            "count" => VariableAction::Count,
            _ => bail!("unsupported variable action '{raw}'"),
        };
        Ok(action)
    }
}

/// Variable entry exactly as written in a metadata file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawVariableSpec {
    #[serde(default)]
    pub parameter: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, rename = "type")]
    pub value_type: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<Value>>,
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default, rename = "const")]
    pub constant: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub parameter: String,
    pub help: Option<String>,
    pub action: VariableAction,
    pub value_type: Option<String>,
    pub choices: Option<Vec<Value>>,
    pub dest: Option<String>,
    pub constant: Option<Value>,
}

impl VariableSpec {
    /// Builds a plain `store` variable with a derived flag; mostly for tests.
    pub fn new(task_name: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            parameter: derive_parameter(task_name, &name),
            name,
            help: None,
            action: VariableAction::Store,
            value_type: None,
            choices: None,
            dest: None,
            constant: None,
        }
    }

    pub fn from_raw(task_name: &str, name: &str, raw: RawVariableSpec) -> Result<Self> {
        let parameter = raw
            .parameter
            .unwrap_or_else(|| derive_parameter(task_name, name));
        if parameter.starts_with('-') && !parameter.starts_with("--") {
            bail!(
                "variable '{name}' uses parameter '{parameter}'; only --long flags or bare positional names are supported"
            );
        }
        if parameter.trim_start_matches('-').is_empty() {
            bail!("variable '{name}' has an empty parameter");
        }
        let action = raw
            .action
            .as_deref()
            .map(VariableAction::from_str)
            .transpose()
            .map_err(|error| anyhow!("variable '{name}': {error}"))?
            .unwrap_or_default();
        if !parameter.starts_with("--") && !action.takes_value() {
            bail!(
                "positional variable '{name}' cannot use action '{}'",
                action.as_str()
            );
        }
        Ok(Self {
            name: name.to_string(),
            parameter,
            help: raw.help,
            action,
            value_type: raw.value_type,
            choices: raw.choices,
            dest: raw.dest,
            constant: raw.constant,
        })
    }

    /// Attribute the parsed value is bound to.
    pub fn binding(&self) -> &str {
        self.dest.as_deref().unwrap_or(&self.name)
    }

    /// `--` flags are optional; anything else is a required positional.
    pub fn is_flag(&self) -> bool {
        self.parameter.starts_with("--")
    }

    pub fn long_name(&self) -> Option<&str> {
        self.parameter.strip_prefix("--")
    }

    pub fn reset_parameter(&self) -> Option<String> {
        self.long_name()
            .map(|long| format!("{RESET_FLAG_PREFIX}{long}"))
    }
}

/// Derives `--dashed-name` from a variable name, dropping the `{task}_` namespace.
///
/// For task `changelog`, `changelog_message` becomes `--message` and
/// `other_option` becomes `--other-option`.
pub fn derive_parameter(task_name: &str, variable_name: &str) -> String {
    let namespace = format!("{task_name}_");
    let bare = variable_name
        .strip_prefix(namespace.as_str())
        .unwrap_or(variable_name);
    format!("--{}", bare.replace('_', "-"))
}

/// Sorted, name-unique set of variable descriptors for one task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableCatalog {
    variables: Vec<VariableSpec>,
}

impl VariableCatalog {
    pub fn from_raw(
        task_name: &str,
        raw: BTreeMap<String, Option<RawVariableSpec>>,
    ) -> Result<Self> {
        let variables = raw
            .into_iter()
            .map(|(name, spec)| VariableSpec::from_raw(task_name, &name, spec.unwrap_or_default()))
            .collect::<Result<Vec<_>>>()?;
        Self::from_specs(variables)
    }

    pub fn from_specs(mut variables: Vec<VariableSpec>) -> Result<Self> {
        variables.sort_by(|left, right| left.name.cmp(&right.name));
        if let Some(pair) = variables
            .windows(2)
            .find(|pair| pair[0].name == pair[1].name)
        {
            bail!("variable '{}' is declared more than once", pair[0].name);
        }
        Ok(Self { variables })
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableSpec> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&VariableSpec> {
        self.variables
            .binary_search_by(|variable| variable.name.as_str().cmp(name))
            .ok()
            .map(|index| &self.variables[index])
    }

    /// CLI spelling for `name`, matched by name then by binding, else `name` itself.
    pub fn parameter_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name)
            .or_else(|| self.variables.iter().find(|variable| variable.binding() == name))
            .map(|variable| variable.parameter.as_str())
            .unwrap_or(name)
    }
}
