use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FILTER_ENV: &str = "GRADEBOOKD_LOG";
pub const LOG_FORMAT_ENV: &str = "GRADEBOOKD_LOG_FORMAT";

/// Installs the global subscriber on stderr. Stdout belongs to the IPC protocol.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false);

    // Ignore error if a global subscriber is already set.
    let _ = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
}
