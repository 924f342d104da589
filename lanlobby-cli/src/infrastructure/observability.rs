use crate::infrastructure::error::{CliError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for the CLI itself
    pub default_level: tracing::Level,
    /// Level for the session engine crates
    pub engine_level: tracing::Level,
    pub json_format: bool,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    /// Whether to write logs at all
    pub show_logs: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: tracing::Level::INFO,
            engine_level: tracing::Level::DEBUG,
            json_format: false,
            show_thread_ids: false,
            show_targets: true,
            show_logs: true,
        }
    }
}

impl LogConfig {
    /// Development configuration (verbose, human-readable)
    pub fn dev() -> Self {
        Self {
            default_level: tracing::Level::DEBUG,
            engine_level: tracing::Level::TRACE,
            show_thread_ids: true,
            ..Default::default()
        }
    }

    /// Only warnings and errors
    pub fn quiet() -> Self {
        Self {
            default_level: tracing::Level::WARN,
            engine_level: tracing::Level::WARN,
            show_targets: false,
            ..Default::default()
        }
    }

    /// One JSON object per line
    pub fn with_json(mut self) -> Self {
        self.json_format = true;
        self
    }

    pub fn with_targets(mut self, show: bool) -> Self {
        self.show_targets = show;
        self
    }

    pub fn without_logs(mut self) -> Self {
        self.show_logs = false;
        self
    }

    /// Directives used when `RUST_LOG` is not set
    pub fn default_directives(&self) -> String {
        format!(
            "lanlobby_cli={},lanlobby={},lanlobby_core={},lanlobby_session={}",
            self.default_level, self.default_level, self.engine_level, self.engine_level
        )
    }

    pub fn init(self) -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directives()));

        let registry = tracing_subscriber::registry().with(env_filter);

        let result = if !self.show_logs {
            registry.try_init()
        } else if self.json_format {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(self.show_targets)
                        .with_thread_ids(self.show_thread_ids),
                )
                .try_init()
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_target(self.show_targets)
                        .with_thread_ids(self.show_thread_ids),
                )
                .try_init()
        };

        result.map_err(|e| CliError::Logging(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.default_level, tracing::Level::INFO);
        assert_eq!(config.engine_level, tracing::Level::DEBUG);
        assert!(!config.json_format);
        assert!(config.show_logs);
    }

    #[test]
    fn test_dev_config() {
        let config = LogConfig::dev();
        assert_eq!(config.default_level, tracing::Level::DEBUG);
        assert!(config.show_thread_ids);
    }

    #[test]
    fn test_quiet_config() {
        let config = LogConfig::quiet();
        assert_eq!(config.engine_level, tracing::Level::WARN);
        assert!(!config.show_targets);
    }

    #[test]
    fn test_builders() {
        let config = LogConfig::default()
            .with_json()
            .with_targets(false)
            .without_logs();
        assert!(config.json_format);
        assert!(!config.show_targets);
        assert!(!config.show_logs);
    }

    #[test]
    fn test_default_directives() {
        let directives = LogConfig::default().default_directives();
        assert!(directives.contains("lanlobby_session=DEBUG"));
        assert!(directives.contains("lanlobby_cli=INFO"));
    }
}
