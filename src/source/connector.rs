// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::source::config::{CONFIG_DEF, ConfigOption, FileSourceConfig};

/// Entry point that validates connector properties and hands out task configs.
///
/// A single file can only be tailed by one task: two tasks on the same file
/// would each resume from the same checkpoint and deliver every line twice.
#[derive(Debug, Default)]
pub struct FileSourceConnector {
    config: Option<FileSourceConfig>,
}

impl FileSourceConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Options this connector accepts
    pub fn config_def(&self) -> &'static [ConfigOption] {
        CONFIG_DEF
    }

    /// Validate the connector properties
    pub fn start(&mut self, props: &HashMap<String, String>) -> Result<()> {
        let config = FileSourceConfig::from_props(props)?;
        info!(
            file = ?config.file,
            topic = %config.topic,
            "Starting file source connector"
        );
        self.config = Some(config);
        Ok(())
    }

    /// Configs for the tasks to run. Always exactly one.
    pub fn task_configs(&self, max_tasks: usize) -> Result<Vec<FileSourceConfig>> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::Config("connector has not been started".to_string()))?;

        match max_tasks {
            0 => Err(Error::Config("max_tasks must be at least 1".to_string())),
            1 => Ok(vec![config.clone()]),
            n => {
                warn!(
                    max_tasks = n,
                    file = ?config.file,
                    "Refusing to run more than one task against a single file"
                );
                Err(Error::Config(format!(
                    "max_tasks is {} but a single file supports only one task",
                    n
                )))
            }
        }
    }

    pub fn stop(&mut self) {
        self.config = None;
    }
}
