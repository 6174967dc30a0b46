use runbook::{run, AppConfig, RunError};
use runbook_engine::ProcessEngine;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error:#}");
            std::process::exit(1);
        }
    };

    let exit_code = match run(std::env::args_os(), &config, &ProcessEngine) {
        Ok(exit_code) => exit_code,
        Err(RunError::Usage(error)) => error.exit(),
        Err(error @ (RunError::Validation(_) | RunError::Configuration(_))) => {
            eprintln!("{error}");
            error.exit_code()
        }
        Err(error @ RunError::Other(_)) => {
            eprintln!("error: {error:#}");
            error.exit_code()
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
