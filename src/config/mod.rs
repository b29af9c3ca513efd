/// Application configuration module
use std::env;
use std::path::PathBuf;

/// State file layout is this service's own, not the legacy `flights-data.json`
pub const DEFAULT_DATA_FILE: &str = "flight-monitor-state.json";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_file: PathBuf,
    pub flight_api: FlightApiConfig,
    pub sms: Option<SmsConfig>,
    pub schedule: Schedule,
}

#[derive(Clone, Debug)]
pub struct FlightApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub fetch_limit: u64,
}

/// Twilio credentials; all three must be present for SMS to be enabled
#[derive(Clone, Debug)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Clone, Debug)]
pub struct Schedule {
    pub check_interval_minutes: u64,
    pub send_interval_ms: u64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let data_file = env::var("DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_FILE));

        let flight_api = FlightApiConfig {
            base_url: env::var("FLIGHT_API_BASE_URL")
                .unwrap_or_else(|_| "http://api.aviationstack.com/v1".to_string()),
            api_key: env::var("FLIGHT_API_KEY").unwrap_or_default(),
            fetch_limit: env_u64("FLIGHT_FETCH_LIMIT", 20),
        };

        let sms = match (
            env_nonempty("TWILIO_ACCOUNT_SID"),
            env_nonempty("TWILIO_AUTH_TOKEN"),
            env_nonempty("TWILIO_PHONE_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(SmsConfig {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        let schedule = Schedule {
            check_interval_minutes: env_u64("CHECK_INTERVAL_MINUTES", 15).max(1),
            send_interval_ms: env_u64("SMS_SEND_INTERVAL_MS", 100),
        };

        Ok(Self {
            bind_addr,
            data_file,
            flight_api,
            sms,
            schedule,
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}
