// SPDX-License-Identifier: Apache-2.0

//! Configuration for the file source.
//!
//! Options arrive as a flat map of name to string value. Absent options fall
//! back to their defaults; present but unusable values are rejected.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Path of the file to tail
pub const FILE_CONFIG: &str = "file";
/// Destination stream for every record
pub const TOPIC_CONFIG: &str = "topic";
/// Delay before each poll, in milliseconds
pub const POLL_INTERVAL_MS_CONFIG: &str = "poll_interval_ms";

const DEFAULT_FILE_NAME: &str = "kafka.txt";
const DEFAULT_TOPIC: &str = "test";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// How prominently an option should be documented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importance {
    High,
    Medium,
    Low,
}

/// Description of a single connector option
#[derive(Debug, Clone, Copy)]
pub struct ConfigOption {
    pub name: &'static str,
    pub importance: Importance,
    pub doc: &'static str,
}

/// Options understood by the file source
pub const CONFIG_DEF: &[ConfigOption] = &[
    ConfigOption {
        name: FILE_CONFIG,
        importance: Importance::High,
        doc: "Path and name of the file to read",
    },
    ConfigOption {
        name: TOPIC_CONFIG,
        importance: Importance::High,
        doc: "Name of the stream records are sent to",
    },
    ConfigOption {
        name: POLL_INTERVAL_MS_CONFIG,
        importance: Importance::Low,
        doc: "Milliseconds to wait before each read of the file",
    },
];

/// Configuration for a single file source task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSourceConfig {
    /// Append-only file to read
    pub file: PathBuf,
    /// Destination stream name
    pub topic: String,
    /// Fixed delay before every poll
    pub poll_interval: Duration,
}

impl Default for FileSourceConfig {
    fn default() -> Self {
        Self {
            file: default_file(),
            topic: DEFAULT_TOPIC.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

fn default_file() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_FILE_NAME)
}

impl FileSourceConfig {
    /// Build the config from connector properties
    pub fn from_props(props: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        for (key, value) in props {
            match key.as_str() {
                FILE_CONFIG => config.file = PathBuf::from(value),
                TOPIC_CONFIG => config.topic = value.clone(),
                POLL_INTERVAL_MS_CONFIG => {
                    let ms = value.trim().parse::<u64>().map_err(|e| {
                        Error::Config(format!(
                            "invalid value {:?} for {}: {}",
                            value, POLL_INTERVAL_MS_CONFIG, e
                        ))
                    })?;
                    config.poll_interval = Duration::from_millis(ms);
                }
                other => debug!(option = other, "Ignoring unknown file source option"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Render the config back into connector properties
    pub fn to_props(&self) -> HashMap<String, String> {
        HashMap::from([
            (FILE_CONFIG.to_string(), self.file.display().to_string()),
            (TOPIC_CONFIG.to_string(), self.topic.clone()),
            (
                POLL_INTERVAL_MS_CONFIG.to_string(),
                self.poll_interval.as_millis().to_string(),
            ),
        ])
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.file.as_os_str().is_empty() {
            return Err(Error::Config(format!("{} must not be empty", FILE_CONFIG)));
        }

        if self.topic.trim().is_empty() {
            return Err(Error::Config(format!("{} must not be empty", TOPIC_CONFIG)));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::Config(format!(
                "{} must be greater than zero",
                POLL_INTERVAL_MS_CONFIG
            )));
        }

        Ok(())
    }
}
