/// Application routes configuration
use crate::handlers::{
    add_monitored, add_phone, airport_history, get_analytics, get_flights, health, list_monitored,
    list_phones, popular_airports, remove_monitored, remove_phone, search_airports, trigger_check,
    AppState,
};
use axum::{
    routing::{get, post},
    Router,
};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Flight lookups
        .route("/api/flights/:airport_code", get(get_flights))
        .route("/api/airports/search", get(search_airports))
        .route("/api/airports/popular", get(popular_airports))
        // Monitoring
        .route("/api/monitor/add", post(add_monitored))
        .route("/api/monitor/remove", post(remove_monitored))
        .route("/api/monitor/list", get(list_monitored))
        .route("/api/monitor/check", post(trigger_check))
        .route("/api/history/:airport_code", get(airport_history))
        // Analytics
        .route("/api/analytics", get(get_analytics))
        // Alert recipients
        .route("/api/phones", get(list_phones))
        .route("/api/phones/add", post(add_phone))
        .route("/api/phones/remove", post(remove_phone))
        .with_state(state)
}
