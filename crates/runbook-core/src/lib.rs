//! Foundational types and utilities shared across runbook crates.
//!
//! Provides the tri-state parsed-argument model consumed by the constraint,
//! persistence and engine layers, plus atomic file-write helpers.

pub mod atomic_io;
pub mod parsed_arguments;

pub use atomic_io::replace_file;
pub use parsed_arguments::{
    display_literal, ArgValue, GlobalOptions, ParsedArguments, PERSIST_DENYLIST,
};
