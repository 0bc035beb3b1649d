//! Demo tools exposed to the model.

mod delivery;
mod weather;
mod writing;

pub use delivery::{CreatePrTool, GenerateCodeTool};
pub use weather::{WeatherData, WeatherTool, DEFAULT_WEATHER_BASE_URL};
pub use writing::{WritingData, WritingTool, WRITER_SYSTEM_PROMPT};

use std::sync::Arc;
use std::time::Duration;
use weft_agent_loop::LlmExecutor;
use weft_contract::{ToolRegistry, ToolRegistryError};

/// Settings shared by the demo tools.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub weather_base_url: url::Url,
    pub writing_model: String,
    /// Simulated latency of `generateCode` and `createPR`.
    pub delivery_delay: Duration,
}

/// Registry with `getWeather`, `generateWriting`, `generateCode` and `createPR`.
pub fn demo_registry(
    config: &ToolsConfig,
    http: reqwest::Client,
    llm: Arc<dyn LlmExecutor>,
) -> Result<ToolRegistry, ToolRegistryError> {
    ToolRegistry::new()
        .with_tool(Arc::new(WeatherTool::new(
            http,
            config.weather_base_url.clone(),
        )))?
        .with_tool(Arc::new(WritingTool::new(llm, config.writing_model.clone())))?
        .with_tool(Arc::new(GenerateCodeTool::new(config.delivery_delay)))?
        .with_tool(Arc::new(CreatePrTool::new(config.delivery_delay)))
}

/// Sleep for `delay` unless the call is cancelled first.
pub(crate) async fn cancellable_delay(
    delay: Duration,
    ctx: &weft_contract::ToolCallContext,
) -> Result<(), weft_contract::ToolError> {
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = ctx.cancelled() => Err(weft_contract::ToolError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_agent_loop::GenaiLlmExecutor;

    #[test]
    fn demo_registry_declares_tools_and_data_kinds() {
        let config = ToolsConfig {
            weather_base_url: url::Url::parse(DEFAULT_WEATHER_BASE_URL).unwrap(),
            writing_model: "gpt-4.1-nano".into(),
            delivery_delay: Duration::from_millis(1),
        };
        let registry = demo_registry(
            &config,
            reqwest::Client::new(),
            Arc::new(GenaiLlmExecutor::default()),
        )
        .unwrap();
        let ids: Vec<String> = registry.descriptors().into_iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            vec!["createPR", "generateCode", "generateWriting", "getWeather"]
        );
        assert!(registry.data_kinds().contains("weather"));
        assert!(registry.data_kinds().contains("generateWriting"));
    }
}
