use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::info;

use crate::EngineInvocation;

/// Environment variable through which the engine finds its configuration.
pub const ENGINE_CONFIG_ENV: &str = "ANSIBLE_CONFIG";

/// Runs an assembled invocation and reports the engine's exit code.
pub trait ExecutionEngine {
    fn run(&self, invocation: &EngineInvocation) -> Result<i32>;
}

/// Spawns the engine as a child process sharing this process's stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEngine;

impl ExecutionEngine for ProcessEngine {
    fn run(&self, invocation: &EngineInvocation) -> Result<i32> {
        if invocation.verbosity > 0 {
            println!("{}", invocation.command_line());
        }
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(config) = &invocation.config_path {
            command.env(ENGINE_CONFIG_ENV, config);
        }
        command.stdin(Stdio::inherit());
        command.stdout(Stdio::inherit());
        command.stderr(Stdio::inherit());

        info!(
            program = invocation.program.as_str(),
            args = invocation.args.len(),
            "launching engine"
        );
        let status = command
            .status()
            .with_context(|| format!("failed to execute engine '{}'", invocation.program))?;
        let exit_code = status.code().unwrap_or(1);
        info!(exit_code, "engine finished");
        Ok(exit_code)
    }
}
