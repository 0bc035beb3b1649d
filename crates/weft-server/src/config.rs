//! Server configuration file.

use crate::tools::{ToolsConfig, DEFAULT_WEATHER_BASE_URL};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use weft_agent_loop::{AgentConfig, StopConditionSpec, ToolExecutionMode};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config (JSON): {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid weather base url: {0}")]
    WeatherUrl(#[from] url::ParseError),
}

/// Settings loaded from the optional JSON config file.
///
/// Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub model: String,
    pub writing_model: String,
    pub system_prompt: String,
    pub tool_execution_mode: ToolExecutionMode,
    pub stop_conditions: Vec<StopConditionSpec>,
    pub tool_errors_fatal: bool,
    /// Commit every finished run to the conversation store.
    pub persist: bool,
    pub tool_delay_ms: u64,
    pub weather_base_url: String,
    /// How long a finished run stays replayable before only the store has it.
    pub completed_retention_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-mini".to_string(),
            writing_model: "gpt-4.1-nano".to_string(),
            system_prompt: String::new(),
            tool_execution_mode: ToolExecutionMode::Sequential,
            stop_conditions: vec![
                StopConditionSpec::StopOnTool {
                    tool_name: "getWeather".to_string(),
                },
                StopConditionSpec::StopOnTool {
                    tool_name: "generateWriting".to_string(),
                },
                StopConditionSpec::MaxRounds { rounds: 3 },
            ],
            tool_errors_fatal: false,
            persist: true,
            tool_delay_ms: 2000,
            weather_base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
            completed_retention_ms: 300_000,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Loop configuration; the executor is left for the caller to inject.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig::new(self.model.clone())
            .with_id("chat")
            .with_system_prompt(self.system_prompt.clone())
            .with_tool_execution_mode(self.tool_execution_mode)
            .with_stop_conditions(self.stop_conditions.iter().cloned())
            .with_tool_errors_fatal(self.tool_errors_fatal)
    }

    pub fn completed_retention(&self) -> Duration {
        Duration::from_millis(self.completed_retention_ms)
    }

    pub fn tools_config(&self) -> Result<ToolsConfig, ConfigError> {
        Ok(ToolsConfig {
            weather_base_url: url::Url::parse(&self.weather_base_url)?,
            writing_model: self.writing_model.clone(),
            delivery_delay: Duration::from_millis(self.tool_delay_ms),
        })
    }
}
