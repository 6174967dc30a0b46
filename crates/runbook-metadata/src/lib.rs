//! Declarative task metadata for runbook.
//!
//! Loads `metadata.runbook.yaml` documents, merges includes, and derives the
//! sorted variable catalog, constraint set and reset rules each task exposes.

pub mod constraint_set;
pub mod metadata;
pub mod task;
pub mod variable_catalog;

pub use constraint_set::{ConditionalConstraint, ConstraintSet, ResetRule};
pub use metadata::{
    load_metadata_file, resolve_metadata, IncludeLookup, Metadata, PlaybookDirLookup,
    METADATA_FILE_NAME,
};
pub use task::{discover_tasks, Task};
pub use variable_catalog::{
    derive_parameter, RawVariableSpec, VariableAction, VariableCatalog, VariableSpec,
    APPEND_UNIQUE_ACTION, REMOVE_ACTION,
};
