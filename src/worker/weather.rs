//! Weather retrieval via the National Weather Service API.
//!
//! Serves two shapes of request: active alerts for a US state, and a point
//! forecast for a latitude/longitude pair (which takes two upstream calls:
//! the points lookup, then the forecast URL it names).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{WorkerAdapter, WorkerError};
use crate::protocol::Envelope;

const NWS_API_BASE: &str = "https://api.weather.gov";
const USER_AGENT: &str = "nlip-mesh/0.1";

const US_STATES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

pub struct WeatherAdapter {
    client: Client,
    base_url: String,
}

/// What a weather envelope is asking for.
#[derive(Debug, PartialEq)]
enum WeatherRequest {
    Alerts(String),
    Forecast(f64, f64),
}

#[derive(Deserialize)]
struct AlertsResponse {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Deserialize)]
struct AlertFeature {
    properties: AlertProperties,
}

#[derive(Deserialize)]
struct AlertProperties {
    event: Option<String>,
    #[serde(rename = "areaDesc")]
    area_desc: Option<String>,
    severity: Option<String>,
    description: Option<String>,
    instruction: Option<String>,
}

#[derive(Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Deserialize)]
struct PointsProperties {
    forecast: String,
}

#[derive(Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Deserialize)]
struct ForecastProperties {
    periods: Vec<ForecastPeriod>,
}

#[derive(Deserialize)]
struct ForecastPeriod {
    name: String,
    temperature: i64,
    #[serde(rename = "temperatureUnit")]
    temperature_unit: String,
    #[serde(rename = "windSpeed")]
    wind_speed: String,
    #[serde(rename = "windDirection")]
    wind_direction: String,
    #[serde(rename = "detailedForecast")]
    detailed_forecast: String,
}

impl WeatherAdapter {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: NWS_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, WorkerError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/geo+json")
            .send()
            .await
            .map_err(|e| WorkerError::Upstream(format!("weather request failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => {
                return Err(WorkerError::Unauthorized(format!(
                    "weather provider rejected request (HTTP {})",
                    status
                )))
            }
            404 => {
                return Err(WorkerError::NoData(
                    "weather provider has no data for that location".to_string(),
                ))
            }
            429 => {
                return Err(WorkerError::RateLimited(
                    "weather provider rate limit exceeded".to_string(),
                ))
            }
            s if !(200..300).contains(&s) => {
                return Err(WorkerError::Upstream(format!(
                    "weather provider returned HTTP {}",
                    status
                )))
            }
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| WorkerError::Upstream(format!("unparseable weather response: {}", e)))
    }

    async fn alerts(&self, state: &str) -> Result<String, WorkerError> {
        let url = format!("{}/alerts/active/area/{}", self.base_url, state);
        let data: AlertsResponse = self.get_json(&url).await?;

        if data.features.is_empty() {
            return Ok(format!("No active weather alerts for {}.", state));
        }

        Ok(format_alerts(&data.features))
    }

    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<String, WorkerError> {
        let points_url = format!("{}/points/{},{}", self.base_url, latitude, longitude);
        let points: PointsResponse = self.get_json(&points_url).await?;

        let forecast: ForecastResponse = self.get_json(&points.properties.forecast).await?;

        Ok(format_forecast(&forecast.properties.periods))
    }
}

impl Default for WeatherAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerAdapter for WeatherAdapter {
    fn capability(&self) -> &str {
        "weather"
    }

    async fn handle(&self, envelope: &Envelope) -> Result<String, WorkerError> {
        match parse_request(envelope).ok_or_else(|| {
            WorkerError::NoData(format!(
                "no US state or coordinates found in request '{}'",
                envelope.content
            ))
        })? {
            WeatherRequest::Alerts(state) => self.alerts(&state).await,
            WeatherRequest::Forecast(lat, lon) => self.forecast(lat, lon).await,
        }
    }
}

fn parse_request(envelope: &Envelope) -> Option<WeatherRequest> {
    if let (Some(lat), Some(lon)) = (envelope.metadata("latitude"), envelope.metadata("longitude"))
    {
        if let (Ok(lat), Ok(lon)) = (lat.parse(), lon.parse()) {
            return Some(WeatherRequest::Forecast(lat, lon));
        }
    }

    if let Some(state) = envelope.metadata("state") {
        let state = state.to_uppercase();
        if US_STATES.contains(&state.as_str()) {
            return Some(WeatherRequest::Alerts(state));
        }
    }

    extract_state(&envelope.content).map(WeatherRequest::Alerts)
}

/// Find the first two-letter US state code in free text.
fn extract_state(content: &str) -> Option<String> {
    let re = match regex::Regex::new(r"\b[A-Z]{2}\b") {
        Ok(r) => r,
        Err(_) => return None,
    };

    let result = re
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .find(|code| US_STATES.contains(&code.as_str()));
    result
}

fn format_alerts(features: &[AlertFeature]) -> String {
    let alerts: Vec<String> = features
        .iter()
        .map(|f| {
            let p = &f.properties;
            format!(
                "**{}**\n- Area: {}\n- Severity: {}\n- Description: {}\n- Instructions: {}",
                p.event.as_deref().unwrap_or("Unknown Event"),
                p.area_desc.as_deref().unwrap_or("Unknown"),
                p.severity.as_deref().unwrap_or("Unknown"),
                p.description.as_deref().unwrap_or("No description available"),
                p.instruction.as_deref().unwrap_or("No specific instructions provided"),
            )
        })
        .collect();

    alerts.join("\n---\n")
}

fn format_forecast(periods: &[ForecastPeriod]) -> String {
    let forecasts: Vec<String> = periods
        .iter()
        .take(5)
        .map(|p| {
            format!(
                "**{}:**\n- Temperature: {}°{}\n- Wind: {} {}\n- Forecast: {}",
                p.name,
                p.temperature,
                p.temperature_unit,
                p.wind_speed,
                p.wind_direction,
                p.detailed_forecast,
            )
        })
        .collect();

    forecasts.join("\n---\n")
}
