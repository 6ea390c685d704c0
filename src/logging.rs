//! Pretty-printing messages to the console, and wiring up diagnostic tracing.

use colored::Colorize;

/// Pretty-print an error message to the console
pub fn error(error_message: String) {
    let error_title = "error:".red().bold();
    eprintln!("{} {}", error_title, error_message);
}

/// Installs a `tracing` subscriber reading its filter from `RUST_LOG`,
/// defaulting to `warn` when unset. Each binary calls this once at startup;
/// pipeline stages emit `tracing::debug!`/`trace!` spans as they run.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .try_init();
}
