//! Dynamic command-line surface for runbook tasks.
//!
//! Builds one subcommand per task from its variable catalog, converts raw
//! values through leaf validators, and folds matches into
//! [`runbook_core::ParsedArguments`].

pub mod cli_types;
pub mod custom_actions;
pub mod parser_builder;
pub mod shell_completion;
pub mod value_parser;

pub use cli_types::*;
pub use custom_actions::{append_unique, remove, ListAction};
pub use parser_builder::{CommandSurface, ParserBuilder, TaskSurface};
pub use shell_completion::render_shell_completion;
pub use value_parser::LeafValueParser;
