//! Relational constraint checks run after parsing and before execution.

pub mod constraint_validator;

pub use constraint_validator::{format_name_list, validate_constraints};
