use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

/// Binding names that never reach the persisted record.
pub const PERSIST_DENYLIST: &[&str] = &[
    "task",
    "target",
    "verbose",
    "ask_pass",
    "private_key_file",
    "extra_vars",
    "reset_queue",
];

static UNSET: ArgValue = ArgValue::Unset;

/// Tri-state value of one variable after parsing.
///
/// `Default` and `Explicit` both count as present for constraint purposes,
/// whatever the wrapped value is. `false` supplied on the command line is
/// still present.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Unset,
    Default(Value),
    Explicit(Value),
}

impl ArgValue {
    pub fn is_present(&self) -> bool {
        !matches!(self, ArgValue::Unset)
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, ArgValue::Explicit(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ArgValue::Unset => None,
            ArgValue::Default(value) | ArgValue::Explicit(value) => Some(value),
        }
    }
}

/// Renders a value the way it is written on the command line.
pub fn display_literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Options shared by every task surface. None of them are persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub verbosity: u8,
    pub ask_pass: bool,
    pub private_key_file: Option<String>,
    pub extra_vars: Vec<String>,
}

/// Result of parsing one invocation, keyed by binding name.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArguments {
    task: String,
    targets: Option<Vec<String>>,
    globals: GlobalOptions,
    values: BTreeMap<String, ArgValue>,
    transient: BTreeSet<String>,
    reset_queue: Vec<String>,
}

impl ParsedArguments {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            targets: None,
            globals: GlobalOptions::default(),
            values: BTreeMap::new(),
            transient: BTreeSet::new(),
            reset_queue: Vec::new(),
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn targets(&self) -> Option<&[String]> {
        self.targets.as_deref()
    }

    pub fn set_targets(&mut self, targets: Vec<String>) {
        self.targets = Some(targets);
    }

    pub fn globals(&self) -> &GlobalOptions {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut GlobalOptions {
        &mut self.globals
    }

    pub fn get(&self, name: &str) -> &ArgValue {
        self.values.get(name).unwrap_or(&UNSET)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).value()
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_present()
    }

    pub fn set_default(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), ArgValue::Default(value));
    }

    pub fn set_explicit(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), ArgValue::Explicit(value));
    }

    /// Drops the entry entirely, reverting it to `Unset`.
    pub fn remove(&mut self, name: &str) -> Option<ArgValue> {
        self.values.remove(name)
    }

    /// Marks a binding as never persisted (positional variables).
    pub fn mark_transient(&mut self, name: impl Into<String>) {
        self.transient.insert(name.into());
    }

    pub fn enqueue_reset(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.reset_queue.contains(&name) {
            self.reset_queue.push(name);
        }
    }

    pub fn reset_queue(&self) -> &[String] {
        &self.reset_queue
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Entries eligible for write-back: present, not transient, not denylisted.
    pub fn persistable_entries(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .filter(|(name, _)| !PERSIST_DENYLIST.contains(&name.as_str()))
            .filter(|(name, _)| !self.transient.contains(name.as_str()))
            .filter_map(|(name, value)| value.value().map(|value| (name.clone(), value.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{display_literal, ArgValue, ParsedArguments};

    #[test]
    fn unit_display_literal_unquotes_strings() {
        assert_eq!(display_literal(&json!("delete")), "delete");
        assert_eq!(display_literal(&json!(1)), "1");
        assert_eq!(display_literal(&json!(true)), "true");
    }

    #[test]
    fn unit_missing_entries_read_as_unset() {
        let parsed = ParsedArguments::new("setup");
        assert_eq!(parsed.get("anything"), &ArgValue::Unset);
        assert!(!parsed.is_present("anything"));
        assert_eq!(parsed.value("anything"), None);
    }

    #[test]
    fn unit_falsy_explicit_value_counts_as_present() {
        let mut parsed = ParsedArguments::new("setup");
        parsed.set_explicit("enabled", json!(false));
        parsed.set_default("count", json!(0));
        assert!(parsed.is_present("enabled"));
        assert!(parsed.get("enabled").is_explicit());
        assert!(parsed.is_present("count"));
        assert!(!parsed.get("count").is_explicit());
    }

    #[test]
    fn functional_persistable_entries_skip_denylist_and_transient() {
        let mut parsed = ParsedArguments::new("setup");
        parsed.set_explicit("mode", json!("delete"));
        parsed.set_default("other_task_value", json!(["a"]));
        parsed.set_explicit("verbose", json!(3));
        parsed.set_explicit("path", json!("/tmp"));
        parsed.mark_transient("path");

        let entries = parsed.persistable_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.get("mode"), Some(&json!("delete")));
        assert_eq!(entries.get("other_task_value"), Some(&json!(["a"])));
    }

    #[test]
    fn regression_reset_queue_keeps_first_occurrence_only() {
        let mut parsed = ParsedArguments::new("setup");
        parsed.enqueue_reset("mode");
        parsed.enqueue_reset("mode");
        parsed.enqueue_reset("name");
        assert_eq!(parsed.reset_queue(), ["mode".to_string(), "name".to_string()]);
    }
}
