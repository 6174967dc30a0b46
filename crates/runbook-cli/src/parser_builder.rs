use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;

use anyhow::{bail, Context, Result};
use clap::builder::PossibleValuesParser;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use runbook_core::{GlobalOptions, ParsedArguments, PERSIST_DENYLIST};
use runbook_metadata::{Metadata, VariableAction, VariableSpec};
use runbook_validators::ValidatorRegistry;
use serde_json::Value;
use tracing::debug;

use crate::cli_types::SurfaceOptions;
use crate::custom_actions::ListAction;
use crate::value_parser::LeafValueParser;

pub const VERBOSE_ID: &str = "verbose";
pub const ASK_PASS_ID: &str = "ask_pass";
pub const PRIVATE_KEY_ID: &str = "private_key_file";
pub const EXTRA_VARS_ID: &str = "extra_vars";
pub const TARGET_ID: &str = "target";

const VARIABLE_ID_PREFIX: &str = "var:";
const RESET_ID_PREFIX: &str = "reset:";
const RESERVED_LONG_FLAGS: &[&str] = &["help", "verbose", "ask-pass", "private-key", "extra-vars"];

fn variable_id(variable: &VariableSpec) -> String {
    format!("{VARIABLE_ID_PREFIX}{}", variable.name)
}

fn reset_id(variable: &VariableSpec) -> String {
    format!("{RESET_ID_PREFIX}{}", variable.name)
}

/// One task as the parser sees it.
#[derive(Debug, Clone, Copy)]
pub struct TaskSurface<'a> {
    pub name: &'a str,
    pub metadata: &'a Metadata,
    pub takes_targets: bool,
}

/// Assembles the dynamic command surface: one subcommand per task.
pub struct ParserBuilder<'a> {
    program: String,
    options: SurfaceOptions,
    validators: &'a ValidatorRegistry,
    targets: Option<&'a [String]>,
    persisted: BTreeMap<String, Value>,
}

impl<'a> ParserBuilder<'a> {
    pub fn new(
        program: impl Into<String>,
        options: SurfaceOptions,
        validators: &'a ValidatorRegistry,
    ) -> Self {
        Self {
            program: program.into(),
            options,
            validators,
            targets: None,
            persisted: BTreeMap::new(),
        }
    }

    /// Restricts the target positional to `targets`. `None` leaves it open.
    pub fn with_targets(mut self, targets: Option<&'a [String]>) -> Self {
        self.targets = targets;
        self
    }

    /// Values seeded as defaults when persistence is enabled.
    pub fn with_persisted_defaults(mut self, record: BTreeMap<String, Value>) -> Self {
        self.persisted = record;
        self
    }

    pub fn build(self, tasks: Vec<TaskSurface<'a>>) -> Result<CommandSurface<'a>> {
        let mut command = Command::new(self.program.clone())
            .subcommand_required(true)
            .arg_required_else_help(true)
            .disable_help_subcommand(true)
            .subcommand_value_name("action")
            .subcommand_help_heading("Actions");
        for task in &tasks {
            command = command.subcommand(
                self.task_command(task)
                    .with_context(|| format!("failed to build parser for task '{}'", task.name))?,
            );
        }
        let persisted = if self.options.persist_params {
            self.persisted
        } else {
            BTreeMap::new()
        };
        debug!(
            program = self.program.as_str(),
            tasks = tasks.len(),
            persisted_defaults = persisted.len(),
            "built command surface"
        );
        Ok(CommandSurface {
            command,
            tasks,
            options: self.options,
            persisted,
        })
    }

    fn task_command(&self, task: &TaskSurface<'a>) -> Result<Command> {
        let mut command = Command::new(task.name.to_string()).args_override_self(true);
        if let Some(summary) = task.metadata.help_summary() {
            command = command.about(summary.to_string());
        }
        if let Some(help) = &task.metadata.help {
            command = command.long_about(help.clone());
        }
        command = command.args(self.global_args());

        let variables = &task.metadata.variables;
        for variable in variables.iter().filter(|variable| !variable.is_flag()) {
            command = command.arg(self.variable_arg(variable)?);
        }
        if task.takes_targets {
            command = command.arg(self.target_arg());
        }
        if let Some(order) = positional_order(task) {
            command = command.after_long_help(order);
        }

        let mut long_flags = RESERVED_LONG_FLAGS
            .iter()
            .map(|flag| flag.to_string())
            .collect::<BTreeSet<_>>();
        for variable in variables.iter().filter(|variable| variable.is_flag()) {
            let long = variable.long_name().unwrap_or_default().to_string();
            if !long_flags.insert(long.clone()) {
                bail!("flag '--{long}' of variable '{}' is already in use", variable.name);
            }
            command = command.arg(self.variable_arg(variable)?);

            if !self.options.persist_params {
                continue;
            }
            let reset_long = variable
                .reset_parameter()
                .unwrap_or_default()
                .trim_start_matches("--")
                .to_string();
            if !long_flags.insert(reset_long.clone()) {
                bail!(
                    "reset flag '--{reset_long}' of variable '{}' is already in use",
                    variable.name
                );
            }
            command = command.arg(
                Arg::new(reset_id(variable))
                    .long(reset_long)
                    .action(ArgAction::Count)
                    .help(format!("Reset {}", variable.name)),
            );
        }
        Ok(command)
    }

    fn global_args(&self) -> Vec<Arg> {
        let mut args = vec![Arg::new(VERBOSE_ID)
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .help("verbose output")];
        if self.options.allow_inventory_auth {
            args.push(
                Arg::new(ASK_PASS_ID)
                    .short('k')
                    .long("ask-pass")
                    .action(ArgAction::SetTrue)
                    .help("ask for connection password"),
            );
            args.push(
                Arg::new(PRIVATE_KEY_ID)
                    .long("private-key")
                    .value_name("PRIVATE_KEY_FILE")
                    .action(ArgAction::Set)
                    .help("use this file to authenticate the connection"),
            );
        }
        if self.options.allow_extra_vars {
            args.push(
                Arg::new(EXTRA_VARS_ID)
                    .short('e')
                    .long("extra-vars")
                    .value_name("EXTRA_VARS")
                    .action(ArgAction::Append)
                    .help_heading("Advanced arguments")
                    .help("set additional variables as key=value or YAML/JSON, if filename prepend with @"),
            );
        }
        args
    }

    fn target_arg(&self) -> Arg {
        let arg = Arg::new(TARGET_ID)
            .value_name("target")
            .help("the target to execute the action against")
            .required(true)
            .num_args(1..)
            .action(ArgAction::Append);
        match self.targets {
            Some(targets) => arg
                .value_parser(PossibleValuesParser::new(targets.to_vec()))
                .hide_possible_values(true),
            None => arg,
        }
    }

    fn variable_arg(&self, variable: &VariableSpec) -> Result<Arg> {
        let validator = variable
            .value_type
            .as_deref()
            .map(|type_name| self.validators.get(type_name))
            .transpose()
            .with_context(|| format!("variable '{}' has an invalid type", variable.name))?;
        let value_parser = LeafValueParser::new(validator, variable.choices.clone());

        let mut arg = Arg::new(variable_id(variable));
        if let Some(help) = &variable.help {
            arg = arg.help(help.clone());
        }
        let arg = match variable.long_name() {
            Some(long) if variable.action.takes_value() => arg
                .long(long.to_string())
                .value_name(variable.binding().to_uppercase())
                .num_args(1)
                .action(ArgAction::Append)
                .value_parser(value_parser),
            Some(long) => arg.long(long.to_string()).action(ArgAction::Count),
            None => arg
                .value_name(variable.parameter.clone())
                .required(true)
                .num_args(1)
                .action(ArgAction::Set)
                .value_parser(value_parser),
        };
        Ok(arg)
    }
}

/// Spells out the positional order: declared positionals first, targets last.
fn positional_order(task: &TaskSurface<'_>) -> Option<String> {
    let mut names = task
        .metadata
        .variables
        .iter()
        .filter(|variable| !variable.is_flag())
        .map(|variable| variable.parameter.clone())
        .collect::<Vec<_>>();
    if task.takes_targets {
        names.push(format!("{TARGET_ID}..."));
    }
    if names.len() < 2 {
        return None;
    }
    Some(format!(
        "Positional arguments are taken in this order: {}",
        names.join(", ")
    ))
}

/// A built command plus what is needed to turn matches into [`ParsedArguments`].
pub struct CommandSurface<'a> {
    command: Command,
    tasks: Vec<TaskSurface<'a>>,
    options: SurfaceOptions,
    persisted: BTreeMap<String, Value>,
}

impl<'a> CommandSurface<'a> {
    pub fn command_mut(&mut self) -> &mut Command {
        &mut self.command
    }

    pub fn task(&self, name: &str) -> Option<&TaskSurface<'a>> {
        self.tasks.iter().find(|task| task.name == name)
    }

    /// Parses `args` (program name first). Usage errors come back as clap errors.
    pub fn parse_from<I, T>(&self, args: I) -> Result<ParsedArguments, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut command = self.command.clone();
        let matches = command.try_get_matches_from_mut(args)?;
        self.collect(&command, &matches)
    }

    fn collect(&self, command: &Command, matches: &ArgMatches) -> Result<ParsedArguments, clap::Error> {
        let Some((task_name, sub)) = matches.subcommand() else {
            return Err(clap::Error::new(ErrorKind::MissingSubcommand).with_cmd(command));
        };
        let task = self
            .task(task_name)
            .ok_or_else(|| clap::Error::new(ErrorKind::InvalidSubcommand).with_cmd(command))?;

        let mut parsed = ParsedArguments::new(task_name);
        collect_globals(&self.options, sub, parsed.globals_mut());
        if task.takes_targets {
            parsed.set_targets(
                sub.get_many::<String>(TARGET_ID)
                    .into_iter()
                    .flatten()
                    .cloned()
                    .collect(),
            );
        }

        for (name, value) in &self.persisted {
            if !PERSIST_DENYLIST.contains(&name.as_str()) {
                parsed.set_default(name.clone(), value.clone());
            }
        }

        let variables = &task.metadata.variables;
        let mut occurrences = variables
            .iter()
            .filter(|variable| {
                sub.value_source(&variable_id(variable)) == Some(ValueSource::CommandLine)
            })
            .flat_map(|variable| occurrences_of(variable, sub))
            .collect::<Vec<_>>();
        occurrences.sort_by_key(|occurrence| occurrence.index);
        for occurrence in &occurrences {
            let binding = occurrence.variable.binding();
            let value = apply_occurrence(
                occurrence.variable,
                parsed.value(binding),
                occurrence.value.clone(),
            );
            parsed.set_explicit(binding, value);
        }

        for variable in variables.iter() {
            if !variable.is_flag() {
                parsed.mark_transient(variable.binding());
            } else if self.options.persist_params && sub.get_count(&reset_id(variable)) > 0 {
                parsed.enqueue_reset(variable.binding());
            }
        }

        debug!(
            task = task_name,
            occurrences = occurrences.len(),
            reset_queue = parsed.reset_queue().len(),
            "parsed task arguments"
        );
        Ok(parsed)
    }
}

fn collect_globals(options: &SurfaceOptions, matches: &ArgMatches, globals: &mut GlobalOptions) {
    globals.verbosity = matches.get_count(VERBOSE_ID);
    if options.allow_inventory_auth {
        globals.ask_pass = matches.get_flag(ASK_PASS_ID);
        globals.private_key_file = matches.get_one::<String>(PRIVATE_KEY_ID).cloned();
    }
    if options.allow_extra_vars {
        globals.extra_vars = matches
            .get_many::<String>(EXTRA_VARS_ID)
            .into_iter()
            .flatten()
            .cloned()
            .collect();
    }
}

/// One command-line occurrence of a variable, at its clap index.
struct Occurrence<'v> {
    index: usize,
    variable: &'v VariableSpec,
    value: Option<Value>,
}

fn occurrences_of<'v>(variable: &'v VariableSpec, matches: &ArgMatches) -> Vec<Occurrence<'v>> {
    let id = variable_id(variable);
    let indices = matches.indices_of(&id).into_iter().flatten();
    if variable.action.takes_value() || !variable.is_flag() {
        let values = matches.get_many::<Value>(&id).into_iter().flatten().cloned();
        return indices
            .zip(values)
            .map(|(index, value)| Occurrence {
                index,
                variable,
                value: Some(value),
            })
            .collect();
    }

    // Count actions only keep the index of their latest occurrence.
    let mut indices = indices.collect::<Vec<_>>();
    let count = usize::from(matches.get_count(&id));
    let latest = indices.last().copied().unwrap_or(usize::MAX);
    while indices.len() < count {
        indices.insert(0, latest);
    }
    indices
        .into_iter()
        .map(|index| Occurrence {
            index,
            variable,
            value: None,
        })
        .collect()
}

/// Applies one occurrence of `variable` to the binding's current value.
fn apply_occurrence(variable: &VariableSpec, current: Option<&Value>, value: Option<Value>) -> Value {
    let items = current
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let value = value.unwrap_or(Value::Null);

    if let Some(action) = ListAction::from_variable_action(variable.action) {
        return Value::Array(action.apply(items, std::iter::once(value)).into_owned());
    }
    match variable.action {
        VariableAction::Store => value,
        VariableAction::StoreTrue => Value::Bool(true),
        VariableAction::StoreFalse => Value::Bool(false),
        VariableAction::Append => Value::Array(items.iter().cloned().chain([value]).collect()),
        VariableAction::AppendConst => {
            let constant = variable.constant.clone().unwrap_or(Value::Null);
            Value::Array(items.iter().cloned().chain([constant]).collect())
        }
        VariableAction::Count => Value::from(current.and_then(Value::as_u64).unwrap_or(0) + 1),
        VariableAction::AppendUnique | VariableAction::Remove => value,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use runbook_core::ArgValue;
    use runbook_metadata::{
        ConstraintSet, Metadata, RawVariableSpec, VariableCatalog,
    };
    use runbook_validators::ValidatorRegistry;
    use serde_json::{json, Value};

    use super::{ParserBuilder, TaskSurface};
    use crate::cli_types::SurfaceOptions;

    fn raw(fields: &[(&str, Value)]) -> Option<RawVariableSpec> {
        let mapping = fields
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<serde_json::Map<_, _>>();
        Some(serde_json::from_value(Value::Object(mapping)).expect("raw spec"))
    }

    fn dummy_metadata() -> Metadata {
        let mut variables = BTreeMap::new();
        variables.insert("automatic".to_string(), raw(&[]));
        variables.insert(
            "mapped".to_string(),
            raw(&[("parameter", json!("--explicit"))]),
        );
        variables.insert(
            "store_true".to_string(),
            raw(&[("action", json!("store_true"))]),
        );
        variables.insert(
            "store_false".to_string(),
            raw(&[("action", json!("store_false"))]),
        );
        variables.insert(
            "mapped_list".to_string(),
            raw(&[
                ("parameter", json!("--my-list")),
                ("action", json!("append")),
            ]),
        );
        variables.insert(
            "plugins".to_string(),
            raw(&[("action", json!("append_unique"))]),
        );
        variables.insert(
            "dummy_port".to_string(),
            raw(&[("type", json!("Port"))]),
        );
        variables.insert(
            "flavor".to_string(),
            raw(&[("choices", json!(["el8", "el9"]))]),
        );
        variables.insert(
            "tags".to_string(),
            raw(&[("action", json!("append_const")), ("const", json!("tagged"))]),
        );
        variables.insert(
            "level".to_string(),
            raw(&[("action", json!("count"))]),
        );
        Metadata {
            help: Some("Dummy action\n\nLonger text".to_string()),
            variables: VariableCatalog::from_raw("dummy", variables).expect("catalog"),
            constraints: ConstraintSet::default(),
            ..Metadata::default()
        }
    }

    fn setup_metadata() -> Metadata {
        let mut variables = BTreeMap::new();
        variables.insert(
            "path".to_string(),
            raw(&[("parameter", json!("path")), ("help", json!("where"))]),
        );
        Metadata {
            variables: VariableCatalog::from_raw("setup", variables).expect("catalog"),
            ..Metadata::default()
        }
    }

    fn targets() -> Vec<String> {
        vec!["testpackage".to_string(), "other".to_string()]
    }

    #[test]
    fn functional_flags_bind_to_dest_and_stay_unset_when_omitted() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let dummy = dummy_metadata();
        let targets = targets();
        let surface = ParserBuilder::new("runbook", SurfaceOptions::default(), &validators)
            .with_targets(Some(&targets))
            .build(vec![TaskSurface {
                name: "dummy",
                metadata: &dummy,
                takes_targets: true,
            }])
            .expect("surface");

        let parsed = surface
            .parse_from(["runbook", "dummy", "testpackage", "--explicit", "foo"])
            .expect("parse");
        assert_eq!(parsed.task(), "dummy");
        assert_eq!(parsed.targets(), Some(&["testpackage".to_string()][..]));
        assert_eq!(parsed.get("mapped"), &ArgValue::Explicit(json!("foo")));
        assert_eq!(parsed.get("automatic"), &ArgValue::Unset);
        assert_eq!(parsed.get("store_true"), &ArgValue::Unset);
    }

    #[test]
    fn functional_actions_fold_occurrences() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let dummy = dummy_metadata();
        let surface = ParserBuilder::new("runbook", SurfaceOptions::default(), &validators)
            .build(vec![TaskSurface {
                name: "dummy",
                metadata: &dummy,
                takes_targets: false,
            }])
            .expect("surface");

        let parsed = surface
            .parse_from([
                "runbook", "dummy", "--store-false", "--my-list", "foo", "--my-list", "bar",
                "--plugins", "x", "--plugins", "x", "--plugins", "y", "--port", "8443",
                "--tags", "--tags", "--level", "--level", "--level", "--automatic", "a",
                "--automatic", "b", "-vv",
            ])
            .expect("parse");
        assert_eq!(parsed.get("store_false"), &ArgValue::Explicit(json!(false)));
        assert_eq!(parsed.value("mapped_list"), Some(&json!(["foo", "bar"])));
        assert_eq!(parsed.value("plugins"), Some(&json!(["x", "y"])));
        assert_eq!(parsed.value("dummy_port"), Some(&json!(8443)));
        assert_eq!(parsed.value("tags"), Some(&json!(["tagged", "tagged"])));
        assert_eq!(parsed.value("level"), Some(&json!(3)));
        assert_eq!(parsed.value("automatic"), Some(&json!("b")));
        assert_eq!(parsed.globals().verbosity, 2);
    }

    fn shared_dest_metadata() -> Metadata {
        let mut variables = BTreeMap::new();
        variables.insert(
            "add_plugin".to_string(),
            raw(&[("action", json!("append_unique")), ("dest", json!("plugins"))]),
        );
        variables.insert(
            "remove_plugin".to_string(),
            raw(&[("action", json!("remove")), ("dest", json!("plugins"))]),
        );
        variables.insert(
            "enable".to_string(),
            raw(&[("action", json!("store_true")), ("dest", json!("enabled"))]),
        );
        variables.insert(
            "disable".to_string(),
            raw(&[("action", json!("store_false")), ("dest", json!("enabled"))]),
        );
        variables.insert(
            "first".to_string(),
            raw(&[("parameter", json!("--a")), ("dest", json!("choice"))]),
        );
        variables.insert(
            "second".to_string(),
            raw(&[("parameter", json!("--b")), ("dest", json!("choice"))]),
        );
        Metadata {
            variables: VariableCatalog::from_raw("shared", variables).expect("catalog"),
            ..Metadata::default()
        }
    }

    #[test]
    fn regression_shared_dest_occurrences_apply_in_command_line_order() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let shared = shared_dest_metadata();
        let surface = ParserBuilder::new("runbook", SurfaceOptions::default(), &validators)
            .build(vec![TaskSurface {
                name: "shared",
                metadata: &shared,
                takes_targets: false,
            }])
            .expect("surface");

        let parsed = surface
            .parse_from([
                "runbook", "shared", "--add-plugin", "x", "--remove-plugin", "x", "--add-plugin",
                "x", "--a", "x", "--b", "y", "--a", "z",
            ])
            .expect("parse");
        assert_eq!(parsed.get("plugins"), &ArgValue::Explicit(json!(["x"])));
        assert_eq!(parsed.get("choice"), &ArgValue::Explicit(json!("z")));

        let parsed = surface
            .parse_from([
                "runbook", "shared", "--add-plugin", "x", "--add-plugin", "y", "--remove-plugin",
                "x",
            ])
            .expect("parse");
        assert_eq!(parsed.value("plugins"), Some(&json!(["y"])));
    }

    #[test]
    fn regression_shared_dest_boolean_pair_last_occurrence_wins() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let shared = shared_dest_metadata();
        let surface = ParserBuilder::new("runbook", SurfaceOptions::default(), &validators)
            .build(vec![TaskSurface {
                name: "shared",
                metadata: &shared,
                takes_targets: false,
            }])
            .expect("surface");

        let parsed = surface
            .parse_from(["runbook", "shared", "--enable", "--disable", "--enable"])
            .expect("parse");
        assert_eq!(parsed.get("enabled"), &ArgValue::Explicit(json!(true)));
        let parsed = surface
            .parse_from(["runbook", "shared", "--disable", "--enable", "--disable"])
            .expect("parse");
        assert_eq!(parsed.get("enabled"), &ArgValue::Explicit(json!(false)));
    }

    #[test]
    fn functional_long_help_states_positional_order() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let setup = setup_metadata();
        let dummy = dummy_metadata();
        let mut surface = ParserBuilder::new("runbook", SurfaceOptions::default(), &validators)
            .build(vec![
                TaskSurface {
                    name: "setup",
                    metadata: &setup,
                    takes_targets: true,
                },
                TaskSurface {
                    name: "dummy",
                    metadata: &dummy,
                    takes_targets: true,
                },
            ])
            .expect("surface");

        let setup_help = surface
            .command_mut()
            .find_subcommand_mut("setup")
            .expect("setup subcommand")
            .render_long_help()
            .to_string();
        assert!(setup_help
            .contains("Positional arguments are taken in this order: path, target..."));
        let dummy_help = surface
            .command_mut()
            .find_subcommand_mut("dummy")
            .expect("dummy subcommand")
            .render_long_help()
            .to_string();
        assert!(!dummy_help.contains("Positional arguments are taken in this order"));

        let parsed = surface
            .parse_from(["runbook", "setup", "/srv", "host-a", "host-b"])
            .expect("parse");
        assert_eq!(parsed.value("path"), Some(&json!("/srv")));
        assert_eq!(
            parsed.targets(),
            Some(&["host-a".to_string(), "host-b".to_string()][..])
        );
    }

    #[test]
    fn regression_invalid_typed_value_and_choice_are_usage_errors() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let dummy = dummy_metadata();
        let surface = ParserBuilder::new("runbook", SurfaceOptions::default(), &validators)
            .build(vec![TaskSurface {
                name: "dummy",
                metadata: &dummy,
                takes_targets: false,
            }])
            .expect("surface");

        let error = surface
            .parse_from(["runbook", "dummy", "--port", "http"])
            .expect_err("invalid port");
        assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
        let error = surface
            .parse_from(["runbook", "dummy", "--flavor", "el7"])
            .expect_err("invalid choice");
        assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn functional_positional_variables_are_required_and_transient() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let setup = setup_metadata();
        let options = SurfaceOptions {
            persist_params: true,
            ..SurfaceOptions::default()
        };
        let surface = ParserBuilder::new("runbook", options, &validators)
            .build(vec![TaskSurface {
                name: "setup",
                metadata: &setup,
                takes_targets: false,
            }])
            .expect("surface");

        assert!(surface.parse_from(["runbook", "setup"]).is_err());
        let parsed = surface
            .parse_from(["runbook", "setup", "/srv"])
            .expect("parse");
        assert_eq!(parsed.get("path"), &ArgValue::Explicit(json!("/srv")));
        assert!(parsed.persistable_entries().is_empty());
    }

    #[test]
    fn integration_persisted_defaults_and_reset_flags() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let dummy = dummy_metadata();
        let options = SurfaceOptions {
            persist_params: true,
            ..SurfaceOptions::default()
        };
        let mut record = BTreeMap::new();
        record.insert("mapped".to_string(), json!("previous"));
        record.insert("plugins".to_string(), json!(["kept"]));
        record.insert("from_other_task".to_string(), json!(1));
        record.insert("verbose".to_string(), json!(4));
        let surface = ParserBuilder::new("runbook", options, &validators)
            .with_persisted_defaults(record)
            .build(vec![TaskSurface {
                name: "dummy",
                metadata: &dummy,
                takes_targets: false,
            }])
            .expect("surface");

        let parsed = surface
            .parse_from(["runbook", "dummy", "--plugins", "new", "--reset-explicit"])
            .expect("parse");
        assert_eq!(parsed.get("mapped"), &ArgValue::Default(json!("previous")));
        assert_eq!(
            parsed.get("plugins"),
            &ArgValue::Explicit(json!(["kept", "new"]))
        );
        assert_eq!(parsed.get("from_other_task"), &ArgValue::Default(json!(1)));
        assert_eq!(parsed.get("verbose"), &ArgValue::Unset);
        assert_eq!(parsed.reset_queue(), ["mapped".to_string()]);
    }

    #[test]
    fn regression_reset_flags_absent_without_persistence() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let dummy = dummy_metadata();
        let surface = ParserBuilder::new("runbook", SurfaceOptions::default(), &validators)
            .build(vec![TaskSurface {
                name: "dummy",
                metadata: &dummy,
                takes_targets: false,
            }])
            .expect("surface");
        assert!(surface
            .parse_from(["runbook", "dummy", "--reset-explicit"])
            .is_err());
    }

    #[test]
    fn regression_unknown_target_is_rejected() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let dummy = dummy_metadata();
        let targets = targets();
        let surface = ParserBuilder::new("runbook", SurfaceOptions::default(), &validators)
            .with_targets(Some(&targets))
            .build(vec![TaskSurface {
                name: "dummy",
                metadata: &dummy,
                takes_targets: true,
            }])
            .expect("surface");
        assert!(surface.parse_from(["runbook", "dummy", "missing"]).is_err());
        assert!(surface.parse_from(["runbook", "dummy"]).is_err());
    }

    #[test]
    fn regression_flag_collision_fails_build() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let mut variables = BTreeMap::new();
        variables.insert(
            "noisy".to_string(),
            raw(&[("parameter", json!("--verbose"))]),
        );
        let metadata = Metadata {
            variables: VariableCatalog::from_raw("noisy", variables).expect("catalog"),
            ..Metadata::default()
        };
        let error = ParserBuilder::new("runbook", SurfaceOptions::default(), &validators)
            .build(vec![TaskSurface {
                name: "noisy",
                metadata: &metadata,
                takes_targets: false,
            }])
            .err()
            .expect("collision");
        assert!(format!("{error:#}").contains("'--verbose'"));
    }

    #[test]
    fn unit_global_auth_flags_follow_options() {
        let validators = ValidatorRegistry::builtin().expect("validators");
        let setup = Metadata::default();
        let options = SurfaceOptions {
            allow_inventory_auth: true,
            allow_extra_vars: false,
            persist_params: false,
        };
        let surface = ParserBuilder::new("runbook", options, &validators)
            .build(vec![TaskSurface {
                name: "setup",
                metadata: &setup,
                takes_targets: false,
            }])
            .expect("surface");
        let parsed = surface
            .parse_from(["runbook", "setup", "-k", "--private-key", "/key"])
            .expect("parse");
        assert!(parsed.globals().ask_pass);
        assert_eq!(parsed.globals().private_key_file.as_deref(), Some("/key"));
        assert!(surface
            .parse_from(["runbook", "setup", "-e", "a=1"])
            .is_err());
    }
}
