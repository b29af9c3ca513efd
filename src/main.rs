/// Flight delay monitor: polling, detection, alerts and analytics
mod clients;
mod config;
mod domain;
mod errors;
mod handlers;
mod repo;
mod routes;
mod services;
mod utils;

use crate::clients::{AviationStackClient, DisabledGateway, MessageGateway, TwilioClient};
use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::repo::{init_store, AirportRegistry, PhoneRepo, RecordRepo, TrackerRepo};
use crate::routes::build_router;
use crate::services::{
    AnalyticsService, FlightMonitor, FlightService, MonitorService, NotificationService,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("Configuration loaded successfully");

    // Load persisted state
    let store = init_store(&config.data_file).await?;
    info!(path = %store.path().display(), "State store ready");

    // Initialize repositories
    let airports = AirportRegistry::new(store.clone());
    let tracker = TrackerRepo::new(store.clone());
    let records = RecordRepo::new(store.clone());
    let phones = PhoneRepo::new(store.clone());

    // Initialize clients
    let provider = Arc::new(AviationStackClient::new(config.flight_api.clone())?);
    let gateway: Arc<dyn MessageGateway> = match config.sms.clone() {
        Some(sms) => {
            info!(from = %sms.from_number, "Twilio SMS service initialized");
            Arc::new(TwilioClient::new(sms)?)
        }
        None => {
            warn!("Twilio credentials not set. SMS notifications disabled.");
            Arc::new(DisabledGateway)
        }
    };

    // Initialize services
    let notifier = NotificationService::new(
        gateway,
        Duration::from_millis(config.schedule.send_interval_ms),
    );
    let flight_monitor = Arc::new(FlightMonitor::new(
        airports.clone(),
        tracker,
        records.clone(),
        phones.clone(),
        provider.clone(),
        notifier,
    ));

    let state = AppState {
        flight_service: Arc::new(FlightService::new(provider)),
        monitor_service: Arc::new(MonitorService::new(airports.clone(), phones)),
        analytics_service: Arc::new(AnalyticsService::new(records.clone())),
        flight_monitor: flight_monitor.clone(),
        records,
    };

    info!(
        airports = airports.list().await.len(),
        interval_minutes = config.schedule.check_interval_minutes,
        "Loaded monitored airport(s) from storage"
    );

    // Start background polling
    start_poll_task(&config, flight_monitor);

    // Build router
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Flight monitor listening on {}", config.bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.flush().await?;
    info!("State flushed, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Periodic poll cycle; a slow cycle delays the next tick instead of overlapping it
fn start_poll_task(config: &AppConfig, monitor: Arc<FlightMonitor>) {
    let period = Duration::from_secs(config.schedule.check_interval_minutes * 60);

    tokio::spawn(async move {
        info!("Starting flight check task (interval: {}s)", period.as_secs());
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick fires immediately; wait a full period like a cron schedule
        ticker.tick().await;
        loop {
            ticker.tick().await;
            monitor.run_cycle().await;
        }
    });
}
