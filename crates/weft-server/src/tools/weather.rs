use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;
use weft_contract::{DataKind, ToolCallContext, ToolError, ToolResult, TypedTool};

/// Public Open-Meteo endpoint.
pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.open-meteo.com";

const CURRENT_FIELDS: &str = "temperature_2m,weathercode,relativehumidity_2m";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WeatherArgs {
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
}

/// Payload of `data-weather`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherData {
    pub temperature: Option<f64>,
    pub weather_code: Option<i64>,
    pub humidity: Option<f64>,
    pub city: String,
    pub loading: bool,
}

impl WeatherData {
    fn loading(city: &str) -> Self {
        Self {
            temperature: None,
            weather_code: None,
            humidity: None,
            city: city.to_string(),
            loading: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Forecast {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    weathercode: i64,
    relativehumidity_2m: f64,
}

/// Current conditions from an Open-Meteo compatible forecast API.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    client: reqwest::Client,
    base_url: Url,
}

impl WeatherTool {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn forecast_url(&self, latitude: f64, longitude: f64) -> Result<Url, ToolError> {
        let mut url = self
            .base_url
            .join("v1/forecast")
            .map_err(|e| ToolError::Internal(format!("invalid weather base url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("latitude", &latitude.to_string())
            .append_pair("longitude", &longitude.to_string())
            .append_pair("current", CURRENT_FIELDS)
            .append_pair("timezone", "auto");
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> Result<CurrentConditions, ToolError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ToolError::ExecutionFailed(format!("weather request failed: {e}")))?;
        let forecast: Forecast = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("invalid weather response: {e}")))?;
        Ok(forecast.current)
    }
}

#[async_trait]
impl TypedTool for WeatherTool {
    type Args = WeatherArgs;

    fn tool_id(&self) -> &str {
        "getWeather"
    }

    fn name(&self) -> &str {
        "Get Weather"
    }

    fn description(&self) -> &str {
        "Get the current weather at a location"
    }

    fn data_kinds(&self) -> Vec<DataKind> {
        vec![DataKind::typed::<WeatherData>("weather")]
    }

    fn validate(&self, args: &WeatherArgs) -> Result<(), String> {
        if !(-90.0..=90.0).contains(&args.latitude) {
            return Err(format!("latitude out of range: {}", args.latitude));
        }
        if !(-180.0..=180.0).contains(&args.longitude) {
            return Err(format!("longitude out of range: {}", args.longitude));
        }
        Ok(())
    }

    async fn execute(&self, args: WeatherArgs, ctx: &ToolCallContext) -> Result<ToolResult, ToolError> {
        ctx.emit("weather", WeatherData::loading(&args.city))?;

        let url = self.forecast_url(args.latitude, args.longitude)?;
        tracing::debug!(call_id = %ctx.call_id(), %url, "fetching weather");
        let current = tokio::select! {
            current = self.fetch(url) => current?,
            _ = ctx.cancelled() => return Err(ToolError::Cancelled),
        };

        let data = WeatherData {
            temperature: Some(current.temperature_2m),
            weather_code: Some(current.weathercode),
            humidity: Some(current.relativehumidity_2m),
            city: args.city.clone(),
            loading: false,
        };
        ctx.emit("weather", &data)?;

        Ok(ToolResult::success(
            "getWeather",
            json!({
                "temperature": data.temperature,
                "weatherCode": data.weather_code,
                "humidity": data.humidity,
                "city": data.city,
            }),
        ))
    }
}
