//! Logging context.
//!
//! The plugin's stdout belongs to the CNI protocol, so diagnostics go to a
//! log file. The subscriber is held in a [`LogContext`] and handed to the
//! workflow rather than installed process-wide.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use ovn_cni_common::{CniError, CniResult};
use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// A tracing dispatcher scoped to the operations run through it.
#[derive(Debug, Clone)]
pub struct LogContext {
    dispatch: Dispatch,
}

impl LogContext {
    /// Append plain-text logs to `path`, creating it if needed.
    ///
    /// `RUST_LOG` takes precedence over `level`.
    pub fn file(path: &Path, level: &str) -> CniResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
            .with(filter(level)?);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
        })
    }

    /// Log to stderr, for running the plugin by hand or when the log file
    /// cannot be opened during DEL.
    pub fn stderr(level: &str) -> CniResult<Self> {
        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter(level)?);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
        })
    }

    /// Discard all events.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Run `f` with this context as the active subscriber.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

fn filter(level: &str) -> CniResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CniError::Config {
            message: format!("invalid log level '{level}': {e}"),
        })
}
