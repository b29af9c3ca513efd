/// External API clients module
use crate::config::{FlightApiConfig, SmsConfig};
use crate::domain::{ArrivalInfo, DepartureInfo, Direction, Flight, FlightStatus};
use crate::errors::{ApiError, ApiResult};
use crate::utils::{num, s_pick};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Source of flight schedule/status snapshots
#[async_trait]
pub trait FlightProvider: Send + Sync {
    async fn fetch(&self, airport_code: &str, direction: Direction) -> ApiResult<Vec<Flight>>;
}

/// Outbound text message channel; returns the gateway message id
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn deliver(&self, recipient: &str, text: &str) -> ApiResult<String>;
}

/// HTTP client wrapper with common configuration
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("flight-monitor/1.0")
            .build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

/// aviationstack flights client
pub struct AviationStackClient {
    http_client: HttpClient,
    config: FlightApiConfig,
}

impl AviationStackClient {
    pub fn new(config: FlightApiConfig) -> ApiResult<Self> {
        Ok(Self {
            http_client: HttpClient::new()?,
            config,
        })
    }
}

#[async_trait]
impl FlightProvider for AviationStackClient {
    async fn fetch(&self, airport_code: &str, direction: Direction) -> ApiResult<Vec<Flight>> {
        let key = self.config.api_key.trim();
        if key.is_empty() || key == "your_api_key_here" {
            return Err(ApiError::ProviderAuth);
        }

        let side = match direction {
            Direction::Departures => "dep_iata",
            Direction::Arrivals => "arr_iata",
        };
        let url = format!("{}/flights", self.config.base_url.trim_end_matches('/'));
        let limit = self.config.fetch_limit.to_string();

        let resp = self
            .http_client
            .get_client()
            .get(&url)
            .query(&[("access_key", key), ("limit", limit.as_str()), (side, airport_code)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ApiError::from_status(resp.status(), "flights API"));
        }

        let json: Value = resp.json().await?;
        parse_flights(&json, airport_code)
    }
}

/// Map a provider response body into snapshot entries
pub fn parse_flights(json: &Value, airport_code: &str) -> ApiResult<Vec<Flight>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ApiError::ProviderTransient("invalid API response".to_string()))?;

    Ok(data.iter().map(|f| parse_flight(f, airport_code)).collect())
}

fn parse_flight(f: &Value, airport_code: &str) -> Flight {
    let dep = &f["departure"];
    let arr = &f["arrival"];
    let or_na = |v: &Value, key: &str| s_pick(v, &[key]).unwrap_or_else(|| "N/A".to_string());
    let or_unknown = |v: &Value, key: &str| s_pick(v, &[key]).unwrap_or_else(|| "Unknown".to_string());

    Flight {
        flight_number: or_na(&f["flight"], "iata"),
        airline: or_unknown(&f["airline"], "name"),
        departure: DepartureInfo {
            airport: or_unknown(dep, "airport"),
            iata: s_pick(dep, &["iata"]).unwrap_or_else(|| airport_code.to_string()),
            scheduled_time: s_pick(dep, &["scheduled"]),
            estimated_time: s_pick(dep, &["estimated"]),
            actual_time: s_pick(dep, &["actual"]),
            delay_minutes: num(&dep["delay"])
                .filter(|d| *d > 0.0)
                .map(|d| d.round() as u32)
                .unwrap_or(0),
            terminal: or_na(dep, "terminal"),
            gate: or_na(dep, "gate"),
        },
        arrival: ArrivalInfo {
            airport: or_unknown(arr, "airport"),
            iata: or_na(arr, "iata"),
            scheduled_time: s_pick(arr, &["scheduled"]),
            estimated_time: s_pick(arr, &["estimated"]),
            actual_time: s_pick(arr, &["actual"]),
            terminal: or_na(arr, "terminal"),
            gate: or_na(arr, "gate"),
        },
        status: f["flight_status"]
            .as_str()
            .map(FlightStatus::parse)
            .unwrap_or(FlightStatus::Unknown),
        aircraft: or_na(&f["aircraft"], "registration"),
    }
}

/// Twilio SMS client
pub struct TwilioClient {
    http_client: HttpClient,
    config: SmsConfig,
}

impl TwilioClient {
    pub fn new(config: SmsConfig) -> ApiResult<Self> {
        Ok(Self {
            http_client: HttpClient::new()?,
            config,
        })
    }
}

#[async_trait]
impl MessageGateway for TwilioClient {
    async fn deliver(&self, recipient: &str, text: &str) -> ApiResult<String> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        );

        let resp = self
            .http_client
            .get_client()
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", recipient),
                ("From", self.config.from_number.as_str()),
                ("Body", text),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("SMS request failed: {}", e)))?;

        let status = resp.status();
        let json: Value = resp
            .json()
            .await
            .map_err(|e| ApiError::Internal(format!("SMS response unreadable: {}", e)))?;

        if !status.is_success() {
            let message = s_pick(&json, &["message"]).unwrap_or_else(|| status.to_string());
            return Err(ApiError::Internal(format!("SMS rejected: {}", message)));
        }

        s_pick(&json, &["sid"])
            .ok_or_else(|| ApiError::Internal("SMS response missing sid".to_string()))
    }
}

/// Gateway used when no SMS credentials are configured
pub struct DisabledGateway;

#[async_trait]
impl MessageGateway for DisabledGateway {
    async fn deliver(&self, _recipient: &str, _text: &str) -> ApiResult<String> {
        Err(ApiError::Internal("SMS gateway not configured".to_string()))
    }
}
