use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use runbook_core::ParsedArguments;
use serde_json::Value;

/// Extra variable every run receives, pointing at the state directory.
pub const STATE_PATH_VARIABLE: &str = "runbook_state_path";

/// Fully assembled engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub config_path: Option<PathBuf>,
    pub verbosity: u8,
}

impl EngineInvocation {
    /// Shell-like rendering used for verbose output.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 2);
        if let Some(config) = &self.config_path {
            parts.push(format!("ANSIBLE_CONFIG={}", config.display()));
        }
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Builds the engine argument list for one parsed invocation.
///
/// `variable_names` are the bindings declared by any task; those present in
/// `parsed` travel as a single sorted JSON `-e` value together with
/// [`STATE_PATH_VARIABLE`].
pub fn build_engine_args<'a>(
    playbook: &Path,
    inventory: &Path,
    state_dir: &Path,
    parsed: &ParsedArguments,
    variable_names: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<String>> {
    let mut args = vec![
        playbook.display().to_string(),
        "--inventory".to_string(),
        inventory.display().to_string(),
    ];
    if let Some(targets) = parsed.targets() {
        args.push("--limit".to_string());
        args.push(targets.join(":"));
    }

    let globals = parsed.globals();
    if globals.verbosity > 0 {
        args.push(format!("-{}", "v".repeat(usize::from(globals.verbosity))));
    }
    if globals.ask_pass {
        args.push("-k".to_string());
    }
    if let Some(private_key) = &globals.private_key_file {
        args.push("--private-key".to_string());
        args.push(private_key.clone());
    }
    for extra in &globals.extra_vars {
        args.push("-e".to_string());
        args.push(extra.clone());
    }

    let mut variables = variable_names
        .into_iter()
        .filter_map(|name| parsed.value(name).map(|value| (name.to_string(), value.clone())))
        .collect::<BTreeMap<String, Value>>();
    variables.insert(
        STATE_PATH_VARIABLE.to_string(),
        Value::String(state_dir.display().to_string()),
    );
    let encoded = serde_json::to_string(&variables).context("failed to encode engine variables")?;
    args.push("-e".to_string());
    args.push(encoded);
    Ok(args)
}
