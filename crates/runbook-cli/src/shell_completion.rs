use std::io::{self, Write};

use clap::Command;
use clap_complete::{
    generate,
    shells::{Bash, Fish, Zsh},
};

use crate::CliShellCompletion;

/// Render a completion script for the dynamically built `command`.
pub fn render_shell_completion(
    command: &mut Command,
    bin_name: &str,
    shell: CliShellCompletion,
    mut writer: impl Write,
) -> io::Result<()> {
    match shell {
        CliShellCompletion::Bash => generate(Bash, command, bin_name, &mut writer),
        CliShellCompletion::Zsh => generate(Zsh, command, bin_name, &mut writer),
        CliShellCompletion::Fish => generate(Fish, command, bin_name, &mut writer),
    }
    writer.flush()
}
