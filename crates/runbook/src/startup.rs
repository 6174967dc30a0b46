use std::collections::BTreeSet;
use std::ffi::OsString;

use anyhow::{anyhow, Context};
use runbook_cli::{render_shell_completion, ParserBuilder, TaskSurface};
use runbook_constraints::validate_constraints;
use runbook_engine::{
    build_engine_args, EngineInvocation, ExecutionEngine, TargetSource, YamlInventory,
};
use runbook_metadata::discover_tasks;
use runbook_state::{apply_reset_rules, PersistedRecord, PersistenceStore};
use runbook_validators::ValidatorRegistry;
use tracing::debug;

use crate::{AppConfig, RunError};

/// Runs one invocation end to end and returns the engine's exit code.
///
/// `args` includes the program name. Nothing is persisted and the engine is
/// not started unless parsing, reset evaluation and validation all succeed.
pub fn run<I, T>(args: I, config: &AppConfig, engine: &dyn ExecutionEngine) -> Result<i32, RunError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let inventory = YamlInventory::new(&config.inventory_path);
    let targets = inventory.find_targets()?;
    let tasks = discover_tasks(&config.playbooks_dir)?;

    let mut surfaces = Vec::with_capacity(tasks.len());
    let mut variable_names = BTreeSet::new();
    for task in &tasks {
        let metadata = task.metadata()?;
        variable_names.extend(
            metadata
                .variables
                .iter()
                .map(|variable| variable.binding().to_string()),
        );
        surfaces.push(TaskSurface {
            name: task.name(),
            metadata,
            takes_targets: task.takes_target_parameter(&config.target_names)?,
        });
    }

    let store = PersistenceStore::in_state_dir(&config.state_dir);
    let record = if config.persist_params {
        store.read()?
    } else {
        PersistedRecord::default()
    };

    let validators = ValidatorRegistry::builtin().context("failed to register value types")?;
    let mut surface = ParserBuilder::new(config.name.clone(), config.surface_options(), &validators)
        .with_targets(targets.as_deref())
        .with_persisted_defaults(record.clone().into_inner())
        .build(surfaces)?;

    if let Some(shell) = config.shell_completion {
        render_shell_completion(
            surface.command_mut(),
            &config.name,
            shell,
            std::io::stdout().lock(),
        )
        .context("failed to render shell completion")?;
        return Ok(0);
    }

    let mut parsed = surface.parse_from(args)?;
    let task_surface = surface
        .task(parsed.task())
        .copied()
        .ok_or_else(|| anyhow!("unknown task '{}'", parsed.task()))?;
    let task = tasks
        .iter()
        .find(|task| task.name() == parsed.task())
        .ok_or_else(|| anyhow!("unknown task '{}'", parsed.task()))?;
    let metadata = task_surface.metadata;

    if config.persist_params {
        let report = apply_reset_rules(&metadata.reset, &record, &mut parsed);
        debug!(
            cascaded = report.cascaded.len(),
            requested = report.requested.len(),
            "applied reset rules"
        );
    }

    let errors = validate_constraints(&metadata.constraints, &parsed, &metadata.variables);
    if !errors.is_empty() {
        return Err(RunError::Validation(errors));
    }

    if task_surface.takes_targets && targets.is_none() {
        return Err(RunError::Configuration(format!(
            "Could not find your inventory at {}",
            inventory.location().display()
        )));
    }

    if config.persist_params {
        store.write(&PersistedRecord::from_parsed(&parsed))?;
    }

    let args = build_engine_args(
        task.path(),
        &config.inventory_path,
        &config.state_dir,
        &parsed,
        variable_names.iter().map(String::as_str),
    )?;
    let invocation = EngineInvocation {
        program: config.engine_program.clone(),
        args,
        config_path: config.existing_engine_config(),
        verbosity: parsed.globals().verbosity,
    };
    debug!(task = parsed.task(), "dispatching to engine");
    Ok(engine.run(&invocation)?)
}
