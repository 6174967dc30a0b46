//! Tool-wide parameter persistence and the reset rules that invalidate it.

pub mod persistence_store;
pub mod reset_engine;

pub use persistence_store::{
    PersistedRecord, PersistenceStore, PARAMETERS_FILE_NAME, STATE_DIR_MODE,
};
pub use reset_engine::{apply_reset_rules, ResetReport};
