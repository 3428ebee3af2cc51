//! tracing subscriber setup. Batch runs log to stderr; the dashboard logs to a file so the
//! terminal stays clean.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

/// Environment variable holding a full filter directive, e.g. `funnelboard=trace`.
pub const LOG_ENV: &str = "FUNNELBOARD_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// `FUNNELBOARD_LOG` when set; otherwise `level` for this crate and warn for dependencies.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if std::env::var(LOG_ENV).is_ok() {
        return EnvFilter::try_from_env(LOG_ENV)
            .map_err(|e| eyre!("Invalid {} environment variable: {}", LOG_ENV, e));
    }
    EnvFilter::try_new(default_directives(level))
        .map_err(|e| eyre!("Invalid log level '{}': {}", level, e))
}

fn default_directives(level: &str) -> String {
    format!("warn,funnelboard={level},funnelboard_cli={level}")
}

pub fn init(level: &str, target: LogTarget) -> Result<()> {
    let filter = build_filter(level)?;

    let fmt_layer = match target {
        LogTarget::Stderr => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| eyre!("Could not open log file {}: {}", path.display(), e))?;
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file))
                .boxed()
        }
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| eyre!("Failed to set global default subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_scope_level_to_crate() {
        assert_eq!(
            default_directives("debug"),
            "warn,funnelboard=debug,funnelboard_cli=debug"
        );
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }
}
