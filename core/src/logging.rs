//! Logging context and subscriber setup.
//!
//! Components never install or override global output. Each one receives a
//! [`LogContext`] in its constructor and emits events parented to that span;
//! the embedding application decides where spans go (see [`init_tracing`]).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::Span;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::ConfigError;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Explicit logging context handed to every component.
#[derive(Debug, Clone)]
pub struct LogContext {
    span: Span,
}

impl LogContext {
    pub fn root(name: &str) -> Self {
        Self {
            span: tracing::info_span!("agentflow", app = %name),
        }
    }

    /// A context that records nothing, for tests and embedding without tracing.
    pub fn disabled() -> Self {
        Self { span: Span::none() }
    }

    pub fn from_span(span: Span) -> Self {
        Self { span }
    }

    /// Narrow the context to a named component.
    pub fn child(&self, component: &str) -> Self {
        Self {
            span: tracing::info_span!(parent: &self.span, "component", name = %component),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Install a global subscriber from `LoggingConfig`.
///
/// `RUST_LOG` takes precedence over `logging.level`. Calling this twice is an
/// error reported by `tracing_subscriber`, so only the binary should call it.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), ConfigError> {
    if !logging.enabled {
        return Ok(());
    }
    if !logging.console && !logging.file {
        return Err(ConfigError::LogFilter(
            "logging disabled for both console and file".to_string(),
        ));
    }

    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = log_filter(&logging.level, rust_log.as_deref())?;

    let file_layer = if logging.file {
        let writer = file_writer(&log_directory(logging))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
    } else {
        None
    };

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::LogFilter(e.to_string()))
}

fn log_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter, ConfigError> {
    let directives = rust_log
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(level);
    EnvFilter::try_new(directives).map_err(|e| ConfigError::LogFilter(format!("{directives}: {e}")))
}

fn log_directory(logging: &LoggingConfig) -> PathBuf {
    match logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(d) => PathBuf::from(d),
        None => std::env::temp_dir().join("agentflow"),
    }
}

/// Non-blocking writer to `agentflow.<pid>.log` under `dir`. The flush guard
/// lives for the rest of the process.
fn file_writer(dir: &Path) -> Result<NonBlocking, ConfigError> {
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let appender =
        tracing_appender::rolling::never(dir, format!("agentflow.{}.log", std::process::id()));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}
