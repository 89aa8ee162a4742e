//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,exam=debug,chat=trace"). Unset or invalid falls back to `DEFAULT_FILTER`.
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Targets in use: "mathgen" (startup, workspaces, sockets), "exam"
//! (selection, generation, export) and "chat" (tutoring turns). Prompt text,
//! uploaded files and answers are never logged, only sizes and counts.

use tracing_subscriber::EnvFilter;

/// Our own targets at debug; HTTP plumbing and the Gemini client's transport
/// stay at info/warn.
const DEFAULT_FILTER: &str = "info,mathgen=debug,exam=debug,chat=debug,tower_http=info,axum=info,hyper=warn,reqwest=warn";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // The two formats are different subscriber types; finish each branch here.
    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    if let Err(e) = installed {
        eprintln!("tracing already initialized: {e}");
    }
    tracing::debug!(target: "mathgen", ?format, "Tracing initialized");
}
