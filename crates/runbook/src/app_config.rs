use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use runbook_cli::{CliShellCompletion, SurfaceOptions};

const DEFAULT_NAME: &str = "runbook";
const DEFAULT_DATA_DIR: &str = "/usr/share/runbook";
const DEFAULT_STATE_DIR: &str = "/var/lib/runbook";
const DEFAULT_ENGINE: &str = "ansible-playbook";
const DEFAULT_TARGET_NAMES: &str = "packages";
const INVENTORY_FILE_NAME: &str = "package_manifest.yaml";
const ENGINE_CONFIG_FILE_NAME: &str = "ansible.cfg";
const PLAYBOOKS_DIR_NAME: &str = "playbooks";

/// Installation layout and feature switches, resolved once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub name: String,
    pub data_dir: PathBuf,
    pub playbooks_dir: PathBuf,
    pub inventory_path: PathBuf,
    pub engine_config_path: PathBuf,
    pub state_dir: PathBuf,
    pub allow_extra_vars: bool,
    pub allow_inventory_auth: bool,
    pub persist_params: bool,
    pub engine_program: String,
    pub target_names: Vec<String>,
    pub shell_completion: Option<CliShellCompletion>,
}

impl AppConfig {
    /// Build config from `RUNBOOK_*` env vars with installation defaults.
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to resolve current directory")?;
        Ok(Self::from_lookup(|key| std::env::var(key).ok(), &cwd))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, cwd: &Path) -> Self {
        let path = |key: &str| {
            lookup(key)
                .filter(|raw| !raw.trim().is_empty())
                .map(PathBuf::from)
        };
        let switch = |key: &str, default: bool| {
            lookup(key)
                .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1"))
                .unwrap_or(default)
        };

        let data_dir = path("RUNBOOK_DATA").unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let target_names = lookup("RUNBOOK_TARGET_NAMES")
            .unwrap_or_else(|| DEFAULT_TARGET_NAMES.to_string())
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            name: lookup("RUNBOOK_NAME")
                .filter(|raw| !raw.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            playbooks_dir: path("RUNBOOK_PLAYBOOKS")
                .unwrap_or_else(|| data_dir.join(PLAYBOOKS_DIR_NAME)),
            inventory_path: path("RUNBOOK_INVENTORY")
                .unwrap_or_else(|| cwd.join(INVENTORY_FILE_NAME)),
            engine_config_path: path("RUNBOOK_ENGINE_CFG")
                .unwrap_or_else(|| data_dir.join(ENGINE_CONFIG_FILE_NAME)),
            state_dir: path("RUNBOOK_STATE").unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR)),
            allow_extra_vars: switch("RUNBOOK_ALLOW_EXTRA_VARS", true),
            allow_inventory_auth: switch("RUNBOOK_ALLOW_INVENTORY_AUTH", false),
            persist_params: switch("RUNBOOK_PERSIST_PARAMS", false),
            engine_program: lookup("RUNBOOK_ENGINE")
                .filter(|raw| !raw.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ENGINE.to_string()),
            target_names,
            shell_completion: lookup("RUNBOOK_SHELL_COMPLETION")
                .as_deref()
                .and_then(CliShellCompletion::parse),
            data_dir,
        }
    }

    pub fn surface_options(&self) -> SurfaceOptions {
        SurfaceOptions {
            allow_inventory_auth: self.allow_inventory_auth,
            allow_extra_vars: self.allow_extra_vars,
            persist_params: self.persist_params,
        }
    }

    /// Engine config path, only when the file exists.
    pub fn existing_engine_config(&self) -> Option<PathBuf> {
        self.engine_config_path
            .is_file()
            .then(|| self.engine_config_path.clone())
    }
}
