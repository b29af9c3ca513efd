/// HTTP request handlers
use crate::domain::{
    AirportHistoryEntry, AirportInfo, AnalyticsReport, CycleSummary, Direction, Flight, Health,
    MonitoredAirport, TimeFilter, UserPhone,
};
use crate::errors::ApiError;
use crate::repo::RecordRepo;
use crate::services::{AnalyticsService, FlightMonitor, FlightService, MonitorService};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub flight_service: Arc<FlightService>,
    pub monitor_service: Arc<MonitorService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub flight_monitor: Arc<FlightMonitor>,
    pub records: RecordRepo,
}

/// Successful response wrapper
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

type Reply<T> = Result<Json<SuccessResponse<T>>, ApiError>;

fn reply<T: Serialize>(data: T) -> Reply<T> {
    Ok(Json(SuccessResponse::new(data)))
}

#[derive(Serialize)]
pub struct FlightsBody {
    pub flights: Vec<Flight>,
}

#[derive(Serialize)]
pub struct AirportsBody<T: Serialize> {
    pub airports: Vec<T>,
}

#[derive(Serialize)]
pub struct PhonesBody {
    pub phones: Vec<UserPhone>,
}

#[derive(Serialize)]
pub struct AnalyticsBody {
    pub analytics: AnalyticsReport,
}

#[derive(Serialize)]
pub struct HistoryBody {
    pub history: Vec<AirportHistoryEntry>,
}

#[derive(Serialize)]
pub struct CycleBody {
    pub summary: CycleSummary,
}

#[derive(Deserialize)]
pub struct FlightsQuery {
    #[serde(rename = "type")]
    pub direction: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub time_filter: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAirportRequest {
    pub airport_code: String,
    #[serde(default)]
    pub airport_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAirportRequest {
    pub airport_code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneRequest {
    pub phone_number: String,
}

/// Health check handler
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        now: Utc::now(),
    })
}

/// Manual fetch for one airport, no detection or persistence
pub async fn get_flights(
    Path(airport_code): Path<String>,
    Query(params): Query<FlightsQuery>,
    State(state): State<AppState>,
) -> Reply<FlightsBody> {
    let flights = state
        .flight_service
        .fetch_flights(
            &airport_code.to_uppercase(),
            params
                .direction
                .as_deref()
                .map(Direction::parse)
                .unwrap_or_default(),
        )
        .await?;
    reply(FlightsBody { flights })
}

pub async fn search_airports(
    Query(params): Query<SearchQuery>,
    State(state): State<AppState>,
) -> Reply<AirportsBody<AirportInfo>> {
    reply(AirportsBody {
        airports: state.flight_service.search_airports(&params.query),
    })
}

pub async fn popular_airports(State(state): State<AppState>) -> Reply<AirportsBody<AirportInfo>> {
    reply(AirportsBody {
        airports: state.flight_service.popular_airports().to_vec(),
    })
}

pub async fn add_monitored(
    State(state): State<AppState>,
    Json(req): Json<AddAirportRequest>,
) -> Reply<AirportsBody<MonitoredAirport>> {
    let airports = state
        .monitor_service
        .add_airport(&req.airport_code, &req.airport_name)
        .await?;
    reply(AirportsBody { airports })
}

pub async fn remove_monitored(
    State(state): State<AppState>,
    Json(req): Json<RemoveAirportRequest>,
) -> Reply<AirportsBody<MonitoredAirport>> {
    let airports = state.monitor_service.remove_airport(&req.airport_code).await;
    reply(AirportsBody { airports })
}

pub async fn list_monitored(State(state): State<AppState>) -> Reply<AirportsBody<MonitoredAirport>> {
    let airports = state.monitor_service.list_airports().await;
    reply(AirportsBody { airports })
}

pub async fn airport_history(
    Path(airport_code): Path<String>,
    State(state): State<AppState>,
) -> Reply<HistoryBody> {
    let history = state
        .records
        .airport_history(&airport_code.to_uppercase())
        .await;
    reply(HistoryBody { history })
}

/// Run one poll cycle now
pub async fn trigger_check(State(state): State<AppState>) -> Reply<CycleBody> {
    let summary = state.flight_monitor.run_cycle().await;
    reply(CycleBody { summary })
}

pub async fn get_analytics(
    Query(params): Query<AnalyticsQuery>,
    State(state): State<AppState>,
) -> Reply<AnalyticsBody> {
    let filter = params
        .time_filter
        .as_deref()
        .map(TimeFilter::parse)
        .unwrap_or_default();
    let analytics = state.analytics_service.generate_report(filter).await;
    reply(AnalyticsBody { analytics })
}

pub async fn list_phones(State(state): State<AppState>) -> Reply<PhonesBody> {
    let phones = state.monitor_service.list_phones().await;
    reply(PhonesBody { phones })
}

pub async fn add_phone(
    State(state): State<AppState>,
    Json(req): Json<PhoneRequest>,
) -> Reply<PhonesBody> {
    let phones = state.monitor_service.add_phone(&req.phone_number).await?;
    reply(PhonesBody { phones })
}

pub async fn remove_phone(
    State(state): State<AppState>,
    Json(req): Json<PhoneRequest>,
) -> Reply<PhonesBody> {
    let phones = state.monitor_service.remove_phone(&req.phone_number).await;
    reply(PhonesBody { phones })
}
