use archive_sink::domain::{DEFAULT_MAX_MERGE_ATTEMPTS, DEFAULT_TIME_TOLERANCE_SECS};
use config::{Config, ConfigError, Environment};
use garde::Validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    #[garde(skip)]
    pub log_level: String,

    /// Message log to replay; `-` reads stdin
    #[serde(default = "default_input_path")]
    #[garde(length(min = 1))]
    pub input_path: String,

    /// Where to write the final store contents as JSON
    #[serde(default)]
    #[garde(length(min = 1))]
    pub snapshot_path: Option<String>,

    /// Conflicting writes tolerated per document before a message fails
    #[serde(default = "default_max_merge_attempts")]
    #[garde(range(min = 1))]
    pub max_merge_attempts: u32,

    /// Consensus timestamp tolerance in seconds
    #[serde(default = "default_time_tolerance_secs")]
    #[garde(range(min = 0))]
    pub time_tolerance_secs: i64,

    /// Messages pushed concurrently during replay
    #[serde(default = "default_ingest_concurrency")]
    #[garde(range(min = 1))]
    pub ingest_concurrency: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_input_path() -> String {
    "-".to_string()
}

fn default_max_merge_attempts() -> u32 {
    DEFAULT_MAX_MERGE_ATTEMPTS
}

fn default_time_tolerance_secs() -> i64 {
    DEFAULT_TIME_TOLERANCE_SECS
}

fn default_ingest_concurrency() -> usize {
    8
}

impl ServiceConfig {
    /// Load configuration from `HABITAT_` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("HABITAT"))
            .build()?
            .try_deserialize()?;

        config
            .validate()
            .map_err(|report| ConfigError::Message(report.to_string()))?;

        Ok(config)
    }

    pub fn reads_stdin(&self) -> bool {
        self.input_path == "-"
    }
}
