//! Runbook binary support: environment configuration, exit-code mapping and
//! the end-to-end invocation flow.

pub mod app_config;
pub mod error;
pub mod startup;

pub use app_config::AppConfig;
pub use error::RunError;
pub use startup::run;
