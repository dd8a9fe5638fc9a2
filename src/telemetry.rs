use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Where `--logs` appends JSON lines.
pub fn tracing_log_path() -> PathBuf {
    env::var("MURMUR_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("murmur_trace.jsonl"))
}

/// Install the global subscriber once. Later calls are no-ops.
///
/// Human-readable lines go to stderr unless `--logs` redirects them as JSON
/// into [`tracing_log_path`]; `--no-logs` silences everything.
pub fn init_tracing(config: &AppConfig) {
    if config.no_logs {
        return;
    }
    let level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let _ = TRACING_INIT.get_or_init(|| {
        if config.logs {
            let path = tracing_log_path();
            let file = match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => file,
                Err(err) => {
                    eprintln!("murmur: cannot open trace log {}: {err}", path.display());
                    return;
                }
            };
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_max_level(level)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(file)
                .with_current_span(false)
                .with_span_list(false)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        } else {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(std::io::stderr)
                .with_thread_names(true)
                .with_target(false)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    });
}
