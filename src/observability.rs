//! Logging setup for the stdio server.
//!
//! stdout carries the protocol, so every log line goes to stderr.

use std::str::FromStr;
use std::sync::OnceLock;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Env var selecting the log line format.
pub const LOG_FORMAT_ENV: &str = "TOOLBROKER_LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset. HTTP client internals are noisy at
/// `info` and are held at `warn`.
pub const DEFAULT_FILTER: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn";

static TRACING_INIT: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl LogFormat {
    /// Format from [`LOG_FORMAT_ENV`]; unknown values fall back to compact.
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

/// Install the global subscriber once for the process.
///
/// Closed `execute` spans are logged with their busy time, which gives one
/// timing line per tool call.
pub fn init_tracing() {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE);

        let installed = match LogFormat::from_env() {
            LogFormat::Json => tracing_subscriber::registry()
                .with(filter)
                .with(base.json().with_current_span(true))
                .try_init(),
            LogFormat::Compact => tracing_subscriber::registry()
                .with(filter)
                .with(base.compact().with_target(false))
                .try_init(),
        };

        if let Err(err) = installed {
            eprintln!("toolbroker: tracing already initialized: {err}");
        }
    });
}
