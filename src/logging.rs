//! Native log initialisation.
//!
//! `RUST_LOG` picks the filter, falling back to [`DEFAULT_LOG_FILTER`].
//! `WALLET_SESSION_LOG_JSON` selects JSON lines for log shippers. Output
//! goes to stderr so the CLI's JSON on stdout stays parseable.

use tracing_subscriber::{fmt, EnvFilter};

use crate::core::keys::{env::LOG_JSON, DEFAULT_LOG_FILTER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `1`, `true`, `yes` or `json` select JSON; anything else is pretty.
    pub fn from_flag(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("1" | "true" | "yes" | "json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }

    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(LOG_JSON).ok().as_deref())
    }
}

/// Install the global subscriber. Later calls keep the first one.
pub fn init_logging() {
    init_with(LogFormat::from_env());
}

pub fn init_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.compact().with_target(false).try_init(),
    };
    if installed.is_ok() {
        tracing::debug!("logging initialised ({:?})", format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_values() {
        assert_eq!(LogFormat::from_flag(Some("1")), LogFormat::Json);
        assert_eq!(LogFormat::from_flag(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::from_flag(Some("0")), LogFormat::Pretty);
        assert_eq!(LogFormat::from_flag(None), LogFormat::Pretty);
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_with(LogFormat::Pretty);
        init_with(LogFormat::Json);
    }
}
