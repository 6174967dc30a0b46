//! List-mutating flag behaviors usable by any variable.
//!
//! Both operate on a `Cow` so a shared default list is never written to: a
//! no-op hands the borrowed input back and the first real change clones it.

use std::borrow::Cow;

use runbook_metadata::{VariableAction, APPEND_UNIQUE_ACTION, REMOVE_ACTION};
use serde_json::Value;

/// Appends `value` unless already present. First occurrences keep their order.
pub fn append_unique<'a>(current: Cow<'a, [Value]>, value: Value) -> Cow<'a, [Value]> {
    if current.contains(&value) {
        return current;
    }
    let mut items = current;
    items.to_mut().push(value);
    items
}

/// Deletes the first occurrence of `value`; absent values are a silent no-op.
pub fn remove<'a>(current: Cow<'a, [Value]>, value: &Value) -> Cow<'a, [Value]> {
    let Some(index) = current.iter().position(|item| item == value) else {
        return current;
    };
    let mut items = current;
    items.to_mut().remove(index);
    items
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Custom list behaviors addressable by their fixed identifiers.
pub enum ListAction {
    AppendUnique,
    Remove,
}

impl ListAction {
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            APPEND_UNIQUE_ACTION => Some(Self::AppendUnique),
            REMOVE_ACTION => Some(Self::Remove),
            _ => None,
        }
    }

    pub fn from_variable_action(action: VariableAction) -> Option<Self> {
        match action {
            VariableAction::AppendUnique => Some(Self::AppendUnique),
            VariableAction::Remove => Some(Self::Remove),
            _ => None,
        }
    }

    pub fn identifier(self) -> &'static str {
        match self {
            Self::AppendUnique => APPEND_UNIQUE_ACTION,
            Self::Remove => REMOVE_ACTION,
        }
    }

    /// Folds `values` into `base` in command-line order.
    pub fn apply<'a>(
        self,
        base: &'a [Value],
        values: impl IntoIterator<Item = Value>,
    ) -> Cow<'a, [Value]> {
        values
            .into_iter()
            .fold(Cow::Borrowed(base), |items, value| match self {
                Self::AppendUnique => append_unique(items, value),
                Self::Remove => remove(items, &value),
            })
    }
}
