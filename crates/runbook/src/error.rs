use thiserror::Error;

/// Failure of one invocation, mapped to a process exit code.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Usage(#[from] clap::Error),
    #[error("{}", .0.join("\n"))]
    Validation(Vec<String>),
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Usage(error) => error.exit_code(),
            RunError::Validation(_) | RunError::Configuration(_) | RunError::Other(_) => 1,
        }
    }
}
