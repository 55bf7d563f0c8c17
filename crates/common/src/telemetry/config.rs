/// Configuration for logging initialization
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "habitat-archive".to_string(),
            log_level: "info".to_string(),
        }
    }
}
