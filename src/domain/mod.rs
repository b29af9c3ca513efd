/// Domain models for the application
use chrono::{DateTime, Duration, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Airport under periodic monitoring, keyed by IATA code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredAirport {
    pub code: String,
    pub name: String,
}

/// Entry of the fixed airport directory used for search
#[derive(Debug, Clone, Serialize)]
pub struct AirportInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub city: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightStatus {
    Scheduled,
    Active,
    Landed,
    Cancelled,
    Incident,
    Diverted,
    #[serde(other)]
    Unknown,
}

impl FlightStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => FlightStatus::Scheduled,
            "active" => FlightStatus::Active,
            "landed" => FlightStatus::Landed,
            "cancelled" => FlightStatus::Cancelled,
            "incident" => FlightStatus::Incident,
            "diverted" => FlightStatus::Diverted,
            _ => FlightStatus::Unknown,
        }
    }
}

/// Which side of the airport a fetch is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Departures,
    Arrivals,
}

impl Direction {
    /// Anything other than `departures` selects arrivals
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("departures") {
            Direction::Departures
        } else {
            Direction::Arrivals
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartureInfo {
    pub airport: String,
    pub iata: String,
    pub scheduled_time: Option<String>,
    pub estimated_time: Option<String>,
    pub actual_time: Option<String>,
    pub delay_minutes: u32,
    pub terminal: String,
    pub gate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalInfo {
    pub airport: String,
    pub iata: String,
    pub scheduled_time: Option<String>,
    pub estimated_time: Option<String>,
    pub actual_time: Option<String>,
    pub terminal: String,
    pub gate: String,
}

/// One observed flight in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub flight_number: String,
    pub airline: String,
    pub departure: DepartureInfo,
    pub arrival: ArrivalInfo,
    pub status: FlightStatus,
    pub aircraft: String,
}

/// Last observed state of one flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFlight {
    pub delay_minutes: u32,
    pub status: FlightStatus,
    pub last_checked: DateTime<Utc>,
}

/// Flight number -> last observed state
pub type TrackedFlightState = HashMap<String, TrackedFlight>;

/// Derived notification trigger, never persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayEvent {
    pub flight: Flight,
    pub delay_minutes: u32,
    pub previous_delay_minutes: u32,
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecord {
    pub timestamp: DateTime<Utc>,
    pub airport_code: String,
    pub flight_number: String,
    pub airline: String,
    pub departure_iata: String,
    pub arrival_iata: String,
    pub scheduled_time: Option<String>,
    pub delay_minutes: u32,
    pub status: FlightStatus,
}

impl FlightRecord {
    pub fn from_flight(airport_code: &str, flight: &Flight, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            airport_code: airport_code.to_string(),
            flight_number: flight.flight_number.clone(),
            airline: flight.airline.clone(),
            departure_iata: flight.departure.iata.clone(),
            arrival_iata: flight.arrival.iata.clone(),
            scheduled_time: flight.departure.scheduled_time.clone(),
            delay_minutes: flight.departure.delay_minutes,
            status: flight.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayTrendPoint {
    pub timestamp: DateTime<Utc>,
    pub average_delay: f64,
}

/// Per-airport snapshot size sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirportHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub flight_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhone {
    pub number: String,
}

/// Outcome of one (event, recipient) delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub recipient: String,
    pub flight_number: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one poll cycle over all monitored airports
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub airports_checked: usize,
    pub airports_failed: usize,
    pub flights_seen: usize,
    pub delay_events: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

/// Analytics window; anything unrecognised means `All`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFilter {
    Day,
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl TimeFilter {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "24h" => TimeFilter::Day,
            "7d" => TimeFilter::Week,
            "30d" => TimeFilter::Month,
            "1y" => TimeFilter::Year,
            _ => TimeFilter::All,
        }
    }

    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = match self {
            TimeFilter::Day => 1,
            TimeFilter::Week => 7,
            TimeFilter::Month => 30,
            TimeFilter::Year => 365,
            TimeFilter::All => return None,
        };
        Some(now - Duration::days(days))
    }
}

/// Ordered key/value ranking, serialized as a JSON object in rank order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking<V>(pub Vec<(String, V)>);

impl<V: Serialize> Serialize for Ranking<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDistribution {
    pub on_time: usize,
    pub delayed: usize,
    pub cancelled: usize,
    pub active: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDelay {
    pub flight_number: String,
    pub airline: String,
    pub departure: String,
    pub arrival: String,
    pub delay: u32,
    pub timestamp: DateTime<Utc>,
}

/// Rollup over a time-filtered slice of the flight history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_flights: usize,
    pub delayed_flights: usize,
    pub on_time_flights: usize,
    pub average_delay: f64,
    pub on_time_percentage: f64,
    pub status_distribution: StatusDistribution,
    pub airline_delays: Ranking<u32>,
    pub delay_trends: Vec<DelayTrendPoint>,
    pub hourly_distribution: BTreeMap<u32, usize>,
    pub top_destinations: Ranking<usize>,
    pub recent_delays: Vec<RecentDelay>,
}

impl Default for AnalyticsReport {
    fn default() -> Self {
        Self {
            total_flights: 0,
            delayed_flights: 0,
            on_time_flights: 0,
            average_delay: 0.0,
            on_time_percentage: 100.0,
            status_distribution: StatusDistribution::default(),
            airline_delays: Ranking::default(),
            delay_trends: Vec::new(),
            hourly_distribution: BTreeMap::new(),
            top_destinations: Ranking::default(),
            recent_delays: Vec::new(),
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
}
