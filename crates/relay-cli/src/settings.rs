//! Settings for the demo binary.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. `config/relay.toml` (optional)
//! 3. `RELAY_*` environment variables, `__` between sections
//!    (e.g. `RELAY_SUBSCRIBER__MAX_RETRIES=2`)

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use relay_core::SubscriberConfig;
use serde::Deserialize;

/// Default settings file, relative to the working directory (extension optional).
pub const DEFAULT_CONFIG_FILE: &str = "config/relay";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub subscriber: SubscriberSettings,
    pub log: LogSettings,
    pub demo: DemoSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SubscriberSettings {
    pub topic: String,
    pub subscription: String,
    pub max_retries: u32,
    pub max_outstanding_messages: Option<usize>,
    pub ack_deadline_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DemoSettings {
    /// Stop after this many seconds if Ctrl-C never comes.
    pub run_secs: u64,

    /// Number of sample orders to publish.
    pub messages: usize,
}

/// Whatever the sources provided; gaps are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
struct PartialSettings {
    subscriber: Option<PartialSubscriberSettings>,
    log: Option<PartialLogSettings>,
    demo: Option<PartialDemoSettings>,
}

#[derive(Debug, Deserialize, Default)]
struct PartialSubscriberSettings {
    topic: Option<String>,
    subscription: Option<String>,
    max_retries: Option<u32>,
    max_outstanding_messages: Option<usize>,
    ack_deadline_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct PartialLogSettings {
    level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PartialDemoSettings {
    run_secs: Option<u64>,
    messages: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subscriber: SubscriberSettings {
                topic: "orders".to_string(),
                subscription: "orders-worker".to_string(),
                max_retries: 5,
                max_outstanding_messages: None,
                ack_deadline_secs: 10,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
            demo: DemoSettings {
                run_secs: 5,
                messages: 10,
            },
        }
    }
}

impl Settings {
    pub fn subscriber_config(&self) -> SubscriberConfig {
        let s = &self.subscriber;
        SubscriberConfig {
            max_retries: s.max_retries,
            max_outstanding_messages: s.max_outstanding_messages,
            ack_deadline: Duration::from_secs(s.ack_deadline_secs),
            ..SubscriberConfig::new(s.topic.as_str(), s.subscription.as_str())
        }
    }

    fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let sub = partial.subscriber.unwrap_or_default();
        let log = partial.log.unwrap_or_default();
        let demo = partial.demo.unwrap_or_default();

        Settings {
            subscriber: SubscriberSettings {
                topic: sub.topic.unwrap_or(default.subscriber.topic),
                subscription: sub.subscription.unwrap_or(default.subscriber.subscription),
                max_retries: sub.max_retries.unwrap_or(default.subscriber.max_retries),
                max_outstanding_messages: sub
                    .max_outstanding_messages
                    .or(default.subscriber.max_outstanding_messages),
                ack_deadline_secs: sub
                    .ack_deadline_secs
                    .unwrap_or(default.subscriber.ack_deadline_secs),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
            demo: DemoSettings {
                run_secs: demo.run_secs.unwrap_or(default.demo.run_secs),
                messages: demo.messages.unwrap_or(default.demo.messages),
            },
        }
    }
}

/// Loads `config/relay.toml` (if present) and the environment over the defaults.
pub fn load() -> Result<Settings, ConfigError> {
    load_from(File::with_name(DEFAULT_CONFIG_FILE).required(false))
}

/// Same as [`load`] but with an explicit, required settings file.
pub fn load_file(path: &Path) -> Result<Settings, ConfigError> {
    load_from(File::from(path).required(true))
}

fn load_from<S>(file: S) -> Result<Settings, ConfigError>
where
    S: config::Source + Send + Sync + 'static,
{
    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(Settings::merge(partial))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.subscriber.topic, "orders");
        assert_eq!(settings.subscriber.max_retries, 5);
        assert_eq!(settings.subscriber.ack_deadline_secs, 10);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_partial_file_is_merged_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[subscriber]
topic = "payments"
max_retries = 2

[demo]
messages = 3
"#
        )
        .unwrap();

        let settings = load_file(&path).unwrap();

        assert_eq!(settings.subscriber.topic, "payments");
        assert_eq!(settings.subscriber.max_retries, 2);
        assert_eq!(settings.subscriber.subscription, "orders-worker");
        assert_eq!(settings.subscriber.ack_deadline_secs, 10);
        assert_eq!(settings.demo.messages, 3);
        assert_eq!(settings.demo.run_secs, 5);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_missing_required_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_file(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_subscriber_config_conversion() {
        let mut settings = Settings::default();
        settings.subscriber.max_outstanding_messages = Some(4);
        settings.subscriber.ack_deadline_secs = 30;

        let config = settings.subscriber_config();

        assert_eq!(config.topic.as_str(), "orders");
        assert_eq!(config.subscription.as_str(), "orders-worker");
        assert_eq!(config.max_outstanding_messages, Some(4));
        assert_eq!(config.ack_deadline, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }
}
