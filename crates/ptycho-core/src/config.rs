use crate::error::{PtychoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for processing intervals and watchdog delays
pub const MAX_INTERVAL_S: u64 = 600;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// What the automation processor does with a file whose workflow failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicyKind {
    /// Mark the file failed and move on
    Fail,
    /// Requeue the file with exponential backoff
    Retry,
}

/// Resolved failure policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Fail,
    Retry { max_attempts: u32, backoff: Duration },
}

impl FailurePolicy {
    /// Delay before the given retry attempt (1-based), doubling each time
    pub fn backoff_for(&self, attempt: u32) -> Option<Duration> {
        match self {
            FailurePolicy::Fail => None,
            FailurePolicy::Retry {
                max_attempts,
                backoff,
            } => {
                if attempt >= *max_attempts {
                    None
                } else {
                    let factor = 1u32 << attempt.saturating_sub(1).min(16);
                    Some(backoff.saturating_mul(factor))
                }
            }
        }
    }
}

/// Automation settings snapshot consumed by the automation pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationSettings {
    pub strategy: String,
    pub data_directory: PathBuf,
    pub processing_interval_s: u64,
    pub use_polling_observer: bool,
    pub watchdog_delay_s: u64,
    pub failure_policy: FailurePolicy,
}

impl AutomationSettings {
    pub fn processing_interval(&self) -> Duration {
        Duration::from_secs(clamp_interval_s(self.processing_interval_s))
    }

    pub fn watchdog_delay(&self) -> Duration {
        Duration::from_secs(clamp_interval_s(self.watchdog_delay_s))
    }
}

impl Default for AutomationSettings {
    fn default() -> Self {
        LayeredConfig::with_defaults().automation_settings()
    }
}

/// Reconstructor settings snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructorSettings {
    pub algorithm: String,
    pub remote_outbox: Option<PathBuf>,
}

impl Default for ReconstructorSettings {
    fn default() -> Self {
        LayeredConfig::with_defaults().reconstructor_settings()
    }
}

/// Layered configuration for Ptycho
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub strategy: ConfigValue<String>,
    pub data_directory: ConfigValue<PathBuf>,
    pub processing_interval_s: ConfigValue<u64>,
    pub use_polling_observer: ConfigValue<bool>,
    pub watchdog_delay_s: ConfigValue<u64>,
    pub failure_policy: ConfigValue<FailurePolicyKind>,
    pub max_attempts: ConfigValue<u32>,
    pub retry_backoff_s: ConfigValue<u64>,
    pub algorithm: ConfigValue<String>,
    pub remote_outbox: ConfigValue<Option<PathBuf>>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            strategy: ConfigValue::new("ProductFile".to_string(), ConfigSource::Default),
            data_directory: ConfigValue::new(PathBuf::from("."), ConfigSource::Default),
            processing_interval_s: ConfigValue::new(0, ConfigSource::Default),
            use_polling_observer: ConfigValue::new(false, ConfigSource::Default),
            watchdog_delay_s: ConfigValue::new(15, ConfigSource::Default),
            failure_policy: ConfigValue::new(FailurePolicyKind::Fail, ConfigSource::Default),
            max_attempts: ConfigValue::new(3, ConfigSource::Default),
            retry_backoff_s: ConfigValue::new(30, ConfigSource::Default),
            algorithm: ConfigValue::new("Passthrough".to_string(), ConfigSource::Default),
            remote_outbox: ConfigValue::new(None, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| PtychoError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| PtychoError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        let automation = file_config.automation;

        if let Some(strategy) = automation.strategy {
            self.strategy.update(strategy, ConfigSource::File);
        }

        if let Some(data_directory) = automation.data_directory {
            self.data_directory.update(data_directory, ConfigSource::File);
        }

        if let Some(interval) = automation.processing_interval_s {
            self.processing_interval_s
                .update(clamp_interval_s(interval), ConfigSource::File);
        }

        if let Some(use_polling) = automation.use_polling_observer {
            self.use_polling_observer.update(use_polling, ConfigSource::File);
        }

        if let Some(delay) = automation.watchdog_delay_s {
            self.watchdog_delay_s.update(clamp_interval_s(delay), ConfigSource::File);
        }

        if let Some(policy) = automation.failure_policy {
            self.failure_policy.update(policy, ConfigSource::File);
        }

        if let Some(max_attempts) = automation.max_attempts {
            self.max_attempts.update(max_attempts, ConfigSource::File);
        }

        if let Some(backoff) = automation.retry_backoff_s {
            self.retry_backoff_s.update(backoff, ConfigSource::File);
        }

        let reconstructor = file_config.reconstructor;

        if let Some(algorithm) = reconstructor.algorithm {
            self.algorithm.update(algorithm, ConfigSource::File);
        }

        if let Some(outbox) = reconstructor.remote_outbox {
            self.remote_outbox.update(Some(outbox), ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // PTYCHO_STRATEGY
        if let Ok(strategy) = env::var("PTYCHO_STRATEGY") {
            self.strategy.update(strategy, ConfigSource::Environment);
        }

        // PTYCHO_DATA_DIRECTORY
        if let Ok(directory) = env::var("PTYCHO_DATA_DIRECTORY") {
            self.data_directory
                .update(PathBuf::from(directory), ConfigSource::Environment);
        }

        // PTYCHO_PROCESSING_INTERVAL_S
        if let Ok(interval_str) = env::var("PTYCHO_PROCESSING_INTERVAL_S") {
            match parse_seconds(&interval_str) {
                Ok(interval) => self
                    .processing_interval_s
                    .update(interval, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid PTYCHO_PROCESSING_INTERVAL_S value '{}': expected seconds",
                    interval_str
                ),
            }
        }

        // PTYCHO_USE_POLLING_OBSERVER
        if let Ok(polling_str) = env::var("PTYCHO_USE_POLLING_OBSERVER") {
            match parse_bool(&polling_str) {
                Ok(use_polling) => self
                    .use_polling_observer
                    .update(use_polling, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid PTYCHO_USE_POLLING_OBSERVER value '{}': expected true or false",
                    polling_str
                ),
            }
        }

        // PTYCHO_WATCHDOG_DELAY_S
        if let Ok(delay_str) = env::var("PTYCHO_WATCHDOG_DELAY_S") {
            match parse_seconds(&delay_str) {
                Ok(delay) => self.watchdog_delay_s.update(delay, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid PTYCHO_WATCHDOG_DELAY_S value '{}': expected seconds",
                    delay_str
                ),
            }
        }

        // PTYCHO_FAILURE_POLICY
        if let Ok(policy_str) = env::var("PTYCHO_FAILURE_POLICY") {
            match parse_failure_policy(&policy_str) {
                Ok(policy) => self.failure_policy.update(policy, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid PTYCHO_FAILURE_POLICY value '{}': expected fail or retry",
                    policy_str
                ),
            }
        }

        // PTYCHO_MAX_ATTEMPTS
        if let Ok(attempts_str) = env::var("PTYCHO_MAX_ATTEMPTS") {
            match attempts_str.trim().parse::<u32>() {
                Ok(attempts) => self.max_attempts.update(attempts, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid PTYCHO_MAX_ATTEMPTS value '{}': expected a positive integer",
                    attempts_str
                ),
            }
        }

        // PTYCHO_RETRY_BACKOFF_S
        if let Ok(backoff_str) = env::var("PTYCHO_RETRY_BACKOFF_S") {
            match backoff_str.trim().parse::<u64>() {
                Ok(backoff) => self.retry_backoff_s.update(backoff, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid PTYCHO_RETRY_BACKOFF_S value '{}': expected seconds",
                    backoff_str
                ),
            }
        }

        // PTYCHO_ALGORITHM
        if let Ok(algorithm) = env::var("PTYCHO_ALGORITHM") {
            self.algorithm.update(algorithm, ConfigSource::Environment);
        }

        // PTYCHO_REMOTE_OUTBOX
        if let Ok(outbox) = env::var("PTYCHO_REMOTE_OUTBOX") {
            self.remote_outbox
                .update(Some(PathBuf::from(outbox)), ConfigSource::Environment);
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(strategy) = overrides.strategy {
            self.strategy.update(strategy, ConfigSource::Cli);
        }

        if let Some(data_directory) = overrides.data_directory {
            self.data_directory.update(data_directory, ConfigSource::Cli);
        }

        if let Some(interval) = overrides.processing_interval_s {
            self.processing_interval_s
                .update(clamp_interval_s(interval), ConfigSource::Cli);
        }

        if let Some(use_polling) = overrides.use_polling_observer {
            self.use_polling_observer.update(use_polling, ConfigSource::Cli);
        }

        if let Some(delay) = overrides.watchdog_delay_s {
            self.watchdog_delay_s.update(clamp_interval_s(delay), ConfigSource::Cli);
        }

        if let Some(policy) = overrides.failure_policy {
            self.failure_policy.update(policy, ConfigSource::Cli);
        }

        if let Some(algorithm) = overrides.algorithm {
            self.algorithm.update(algorithm, ConfigSource::Cli);
        }
    }

    /// Automation settings resolved from the current layers
    pub fn automation_settings(&self) -> AutomationSettings {
        let failure_policy = match self.failure_policy.value {
            FailurePolicyKind::Fail => FailurePolicy::Fail,
            FailurePolicyKind::Retry => FailurePolicy::Retry {
                max_attempts: self.max_attempts.value.max(1),
                backoff: Duration::from_secs(self.retry_backoff_s.value),
            },
        };

        AutomationSettings {
            strategy: self.strategy.value.clone(),
            data_directory: self.data_directory.value.clone(),
            processing_interval_s: self.processing_interval_s.value,
            use_polling_observer: self.use_polling_observer.value,
            watchdog_delay_s: self.watchdog_delay_s.value,
            failure_policy,
        }
    }

    /// Reconstructor settings resolved from the current layers
    pub fn reconstructor_settings(&self) -> ReconstructorSettings {
        ReconstructorSettings {
            algorithm: self.algorithm.value.clone(),
            remote_outbox: self.remote_outbox.value.clone(),
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "automation.strategy".to_string(),
            (self.strategy.value.clone(), self.strategy.source),
        );

        map.insert(
            "automation.data_directory".to_string(),
            (self.data_directory.value.display().to_string(), self.data_directory.source),
        );

        map.insert(
            "automation.processing_interval_s".to_string(),
            (self.processing_interval_s.value.to_string(), self.processing_interval_s.source),
        );

        map.insert(
            "automation.use_polling_observer".to_string(),
            (self.use_polling_observer.value.to_string(), self.use_polling_observer.source),
        );

        map.insert(
            "automation.watchdog_delay_s".to_string(),
            (self.watchdog_delay_s.value.to_string(), self.watchdog_delay_s.source),
        );

        map.insert(
            "automation.failure_policy".to_string(),
            (format!("{:?}", self.failure_policy.value), self.failure_policy.source),
        );

        map.insert(
            "automation.max_attempts".to_string(),
            (self.max_attempts.value.to_string(), self.max_attempts.source),
        );

        map.insert(
            "automation.retry_backoff_s".to_string(),
            (self.retry_backoff_s.value.to_string(), self.retry_backoff_s.source),
        );

        map.insert(
            "reconstructor.algorithm".to_string(),
            (self.algorithm.value.clone(), self.algorithm.source),
        );

        let outbox = match &self.remote_outbox.value {
            Some(path) => path.display().to_string(),
            None => "(none)".to_string(),
        };
        map.insert("reconstructor.remote_outbox".to_string(), (outbox, self.remote_outbox.source));

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Default, Deserialize, Serialize)]
struct FileConfig {
    #[serde(default)]
    automation: AutomationSection,
    #[serde(default)]
    reconstructor: ReconstructorSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct AutomationSection {
    strategy: Option<String>,
    data_directory: Option<PathBuf>,
    processing_interval_s: Option<u64>,
    use_polling_observer: Option<bool>,
    watchdog_delay_s: Option<u64>,
    failure_policy: Option<FailurePolicyKind>,
    max_attempts: Option<u32>,
    retry_backoff_s: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ReconstructorSection {
    algorithm: Option<String>,
    remote_outbox: Option<PathBuf>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub strategy: Option<String>,
    pub data_directory: Option<PathBuf>,
    pub processing_interval_s: Option<u64>,
    pub use_polling_observer: Option<bool>,
    pub watchdog_delay_s: Option<u64>,
    pub failure_policy: Option<FailurePolicyKind>,
    pub algorithm: Option<String>,
}

/// Clamp an interval or delay to the accepted range
pub fn clamp_interval_s(value: u64) -> u64 {
    value.min(MAX_INTERVAL_S)
}

/// Parse a seconds value, clamping it to the accepted range
pub fn parse_seconds(s: &str) -> Result<u64> {
    s.trim()
        .parse::<u64>()
        .map(clamp_interval_s)
        .map_err(|_| PtychoError::ConfigInvalid {
            key: "seconds".to_string(),
            reason: format!("Invalid duration: {}. Use a whole number of seconds", s),
        })
}

/// Parse a boolean flag
pub fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(PtychoError::ConfigInvalid {
            key: "flag".to_string(),
            reason: format!("Invalid boolean: {}. Use true or false", s),
        }),
    }
}

/// Parse failure policy from string
pub fn parse_failure_policy(s: &str) -> Result<FailurePolicyKind> {
    match s.trim().to_lowercase().as_str() {
        "fail" => Ok(FailurePolicyKind::Fail),
        "retry" => Ok(FailurePolicyKind::Retry),
        _ => Err(PtychoError::ConfigInvalid {
            key: "failure_policy".to_string(),
            reason: format!("Invalid failure policy: {}. Use fail or retry", s),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.strategy.value, "ProductFile");
        assert_eq!(config.strategy.source, ConfigSource::Default);
        assert_eq!(config.watchdog_delay_s.value, 15);
        assert_eq!(config.failure_policy.value, FailurePolicyKind::Fail);
        assert_eq!(config.algorithm.value, "Passthrough");
        assert!(config.remote_outbox.value.is_none());
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        // File should override default
        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        // Environment should override file
        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        // CLI should override environment
        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[automation]
strategy = "ScanCorrelation"
data_directory = "/data/incoming"
processing_interval_s = 5
use_polling_observer = true
watchdog_delay_s = 3
failure_policy = "retry"
max_attempts = 4

[reconstructor]
algorithm = "None"
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.strategy.value, "ScanCorrelation");
        assert_eq!(config.strategy.source, ConfigSource::File);
        assert_eq!(config.data_directory.value, PathBuf::from("/data/incoming"));
        assert_eq!(config.processing_interval_s.value, 5);
        assert!(config.use_polling_observer.value);
        assert_eq!(config.watchdog_delay_s.value, 3);
        assert_eq!(config.failure_policy.value, FailurePolicyKind::Retry);
        assert_eq!(config.algorithm.value, "None");
        // Not in file
        assert_eq!(config.retry_backoff_s.source, ConfigSource::Default);

        let settings = config.automation_settings();
        assert_eq!(
            settings.failure_policy,
            FailurePolicy::Retry {
                max_attempts: 4,
                backoff: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn test_file_values_are_clamped() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[automation]\nwatchdog_delay_s = 9000").unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();
        assert_eq!(config.watchdog_delay_s.value, MAX_INTERVAL_S);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[automation\nstrategy = ").unwrap();

        let result = LayeredConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(result, Err(PtychoError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        let overrides = CliConfigOverrides {
            strategy: Some("ScanCorrelation".to_string()),
            watchdog_delay_s: Some(1),
            ..CliConfigOverrides::default()
        };

        config.update_from_cli(overrides);

        assert_eq!(config.strategy.value, "ScanCorrelation");
        assert_eq!(config.strategy.source, ConfigSource::Cli);
        assert_eq!(config.watchdog_delay_s.value, 1);
        // These should still be defaults
        assert_eq!(config.algorithm.source, ConfigSource::Default);
        assert_eq!(config.data_directory.source, ConfigSource::Default);
    }

    #[test]
    fn test_backoff_doubles_until_exhausted() {
        let policy = FailurePolicy::Retry {
            max_attempts: 3,
            backoff: Duration::from_secs(10),
        };

        assert_eq!(policy.backoff_for(1), Some(Duration::from_secs(10)));
        assert_eq!(policy.backoff_for(2), Some(Duration::from_secs(20)));
        assert_eq!(policy.backoff_for(3), None);
        assert_eq!(FailurePolicy::Fail.backoff_for(1), None);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_seconds("42").unwrap(), 42);
        assert_eq!(parse_seconds("601").unwrap(), 600);
        assert!(parse_seconds("-1").is_err());
        assert!(parse_bool("Yes").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(parse_bool("maybe").is_err());
        assert_eq!(parse_failure_policy("RETRY").unwrap(), FailurePolicyKind::Retry);
        assert!(parse_failure_policy("ignore").is_err());
    }

    #[test]
    fn test_inspection_map() {
        let config = LayeredConfig::with_defaults();
        let map = config.to_inspection_map();

        assert!(map.contains_key("automation.strategy"));
        assert!(map.contains_key("reconstructor.algorithm"));

        let (outbox, source) = &map["reconstructor.remote_outbox"];
        assert_eq!(outbox, "(none)");
        assert_eq!(*source, ConfigSource::Default);
    }
}
