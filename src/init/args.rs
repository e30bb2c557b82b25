// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::Deserialize;
use tower::BoxError;

use crate::error::{Error, Result};
use crate::init::parse;
use crate::sink::{BlackholeSink, JsonLinesSink, OffsetCommitterConfig, RecordSink};

/// Environment prefix for source properties, e.g. `FILETAIL_SOURCE_TOPIC`
pub const SOURCE_ENV_PREFIX: &str = "FILETAIL_SOURCE_";

#[derive(Copy, Clone, Debug, Default, ValueEnum, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Append records as JSON lines, one file per topic
    #[default]
    #[value(name = "json_lines")]
    JsonLines,
    /// Discard records
    Blackhole,
}

#[derive(Debug, Args, Clone)]
pub struct StartArgs {
    /// JSON file holding source properties
    #[arg(long, env = "FILETAIL_SOURCE_CONFIG")]
    pub source_config: Option<PathBuf>,

    /// Source property as key=value, overrides the config file and environment
    #[arg(long = "set", value_parser = parse::parse_key_val::<String, String>)]
    pub set: Vec<(String, String)>,

    /// Number of tasks requested from the connector
    #[arg(long, env = "FILETAIL_MAX_TASKS", default_value = "1")]
    pub max_tasks: usize,

    /// Checkpoint database path
    #[arg(
        long,
        env = "FILETAIL_OFFSETS_PATH",
        default_value = "/tmp/filetail/offsets.json"
    )]
    pub offsets_path: PathBuf,

    /// Record sink
    #[arg(value_enum, long, env = "FILETAIL_SINK", default_value = "json_lines")]
    pub sink: SinkKind,

    /// Output directory for the json_lines sink
    #[arg(long, env = "FILETAIL_OUTPUT_DIR", default_value = "/tmp/filetail/out")]
    pub output_dir: PathBuf,

    /// Interval between checkpoint commits, in milliseconds
    #[arg(long, env = "FILETAIL_CHECKPOINT_INTERVAL_MS", default_value = "1000")]
    pub checkpoint_interval_ms: u64,

    /// How long checkpoint commits may keep failing before the agent exits, in milliseconds
    #[arg(
        long,
        env = "FILETAIL_MAX_CHECKPOINT_FAILURE_DURATION_MS",
        default_value = "60000"
    )]
    pub max_checkpoint_failure_duration_ms: u64,
}

impl StartArgs {
    /// Assemble the flat source property map. Later layers win: config file,
    /// then `FILETAIL_SOURCE_*` variables, then `--set` flags.
    pub fn source_props(&self) -> std::result::Result<HashMap<String, String>, BoxError> {
        let mut figment = Figment::new();
        if let Some(path) = &self.source_config {
            if !path.is_file() {
                return Err(format!("source config file not found: {}", path.display()).into());
            }
            figment = figment.merge(Json::file(path));
        }

        // raw strings, so a topic of `007` is not read as the number 7
        let env: HashMap<String, String> = Env::prefixed(SOURCE_ENV_PREFIX)
            .ignore(&["config"])
            .iter()
            .map(|(key, value)| (key.as_str().to_lowercase(), value))
            .collect();
        let overrides: HashMap<String, String> = self.set.iter().cloned().collect();
        let figment = figment
            .merge(Serialized::defaults(env))
            .merge(Serialized::defaults(overrides));

        let values: HashMap<String, serde_json::Value> = match figment.extract() {
            Ok(values) => values,
            Err(e) => return Err(format!("failed to parse source config: {}", e).into()),
        };

        Ok(values
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect())
    }

    pub fn committer_config(&self) -> Result<OffsetCommitterConfig> {
        if self.checkpoint_interval_ms == 0 {
            return Err(Error::Config(
                "checkpoint_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(OffsetCommitterConfig {
            checkpoint_interval: Duration::from_millis(self.checkpoint_interval_ms),
            max_checkpoint_failure_duration: Duration::from_millis(
                self.max_checkpoint_failure_duration_ms,
            ),
        })
    }

    pub fn build_sink(&self) -> Result<Box<dyn RecordSink>> {
        Ok(match self.sink {
            SinkKind::JsonLines => Box::new(JsonLinesSink::new(&self.output_dir)?),
            SinkKind::Blackhole => Box::new(BlackholeSink::new()),
        })
    }
}
