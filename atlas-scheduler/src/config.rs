use crate::error::{Result, SchedulerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Scheduler tuning knobs. Every field has a default, so a config file is
/// optional and may set only the fields it cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Port the scheduler RPC server listens on. 0 binds an ephemeral port.
    pub port: u16,
    /// Restricted directory staged RUN/DEPLOY files are read from.
    pub staging_dir: PathBuf,
    pub heartbeat_initial_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
    pub execute_timeout_secs: u64,
    /// Failures beyond this count dead-letter the job.
    pub max_retries: u32,
    /// In-flight ceiling per worker; at this load a worker is saturated.
    pub max_worker_capacity: u32,
    pub idle_backoff_ms: u64,
    pub no_worker_backoff_ms: u64,
    pub saturated_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            staging_dir: PathBuf::from("staging"),
            heartbeat_initial_secs: 5,
            heartbeat_interval_secs: 10,
            heartbeat_timeout_secs: 10,
            execute_timeout_secs: 30,
            max_retries: 3,
            max_worker_capacity: 4,
            idle_backoff_ms: 1000,
            no_worker_backoff_ms: 2000,
            saturated_backoff_ms: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|e| SchedulerError::Configuration(e.to_string()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 7070\nmax_retries = 5").unwrap();

        let config = SchedulerConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 7070);
        assert_eq!(config.max_retries, 5);
        // Untouched fields keep their defaults.
        assert_eq!(config.max_worker_capacity, 4);
        assert_eq!(config.heartbeat_interval_secs, 10);
    }

    #[test]
    fn garbage_file_is_a_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();
        assert!(matches!(
            SchedulerConfig::load(file.path()),
            Err(SchedulerError::Configuration(_))
        ));
    }
}
