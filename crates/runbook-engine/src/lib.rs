//! Downstream collaborators: the inventory that names valid targets and the
//! execution engine that runs a task's playbook.

pub mod engine_args;
pub mod inventory;
pub mod process_engine;

pub use engine_args::{build_engine_args, EngineInvocation, STATE_PATH_VARIABLE};
pub use inventory::{parse_inventory, TargetSource, YamlInventory};
pub use process_engine::{ExecutionEngine, ProcessEngine, ENGINE_CONFIG_ENV};
