use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliShellCompletion {
    Bash,
    Zsh,
    Fish,
}

impl CliShellCompletion {
    pub fn parse(raw: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(raw.trim(), true).ok()
    }
}

/// Switches deciding which optional flags a task surface exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub allow_inventory_auth: bool,
    pub allow_extra_vars: bool,
    pub persist_params: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            allow_inventory_auth: false,
            allow_extra_vars: true,
            persist_params: false,
        }
    }
}
