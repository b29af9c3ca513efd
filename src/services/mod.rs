/// Business logic services layer
pub mod analytics;
pub mod detector;
pub mod notifier;

pub use analytics::AnalyticsService;
pub use notifier::NotificationService;

use crate::clients::FlightProvider;
use crate::domain::{
    AirportInfo, CycleSummary, Direction, Flight, MonitoredAirport, UserPhone,
};
use crate::errors::{ApiError, ApiResult};
use crate::repo::{AirportRegistry, PhoneRepo, RecordRepo, TrackerRepo};
use crate::utils::normalize_phone;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const POPULAR_AIRPORTS: &[AirportInfo] = &[
    AirportInfo { code: "YYZ", name: "Toronto Pearson International Airport", city: "Toronto" },
    AirportInfo { code: "YUL", name: "Montreal-Trudeau International Airport", city: "Montreal" },
    AirportInfo { code: "YVR", name: "Vancouver International Airport", city: "Vancouver" },
    AirportInfo { code: "JFK", name: "John F. Kennedy International Airport", city: "New York" },
    AirportInfo { code: "LAX", name: "Los Angeles International Airport", city: "Los Angeles" },
    AirportInfo { code: "ORD", name: "Chicago O'Hare International Airport", city: "Chicago" },
    AirportInfo { code: "LHR", name: "London Heathrow Airport", city: "London" },
    AirportInfo { code: "CDG", name: "Charles de Gaulle Airport", city: "Paris" },
];

/// Manual flight lookups and the airport directory
pub struct FlightService {
    provider: Arc<dyn FlightProvider>,
}

impl FlightService {
    pub fn new(provider: Arc<dyn FlightProvider>) -> Self {
        Self { provider }
    }

    pub async fn fetch_flights(&self, code: &str, direction: Direction) -> ApiResult<Vec<Flight>> {
        info!(code, ?direction, "Fetching flights");
        self.provider.fetch(code, direction).await
    }

    pub fn popular_airports(&self) -> &'static [AirportInfo] {
        POPULAR_AIRPORTS
    }

    pub fn search_airports(&self, query: &str) -> Vec<AirportInfo> {
        let q = query.trim().to_lowercase();
        POPULAR_AIRPORTS
            .iter()
            .filter(|a| {
                a.code.to_lowercase().contains(&q)
                    || a.name.to_lowercase().contains(&q)
                    || a.city.to_lowercase().contains(&q)
            })
            .cloned()
            .collect()
    }
}

/// Monitored airports and notification recipients
pub struct MonitorService {
    airports: AirportRegistry,
    phones: PhoneRepo,
}

impl MonitorService {
    pub fn new(airports: AirportRegistry, phones: PhoneRepo) -> Self {
        Self { airports, phones }
    }

    pub async fn add_airport(&self, code: &str, name: &str) -> ApiResult<Vec<MonitoredAirport>> {
        let code = code.trim().to_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ApiError::Validation(format!(
                "airport code must be a 3-letter IATA code, got {:?}",
                code
            )));
        }
        let name = match name.trim() {
            "" => code.clone(),
            n => n.to_string(),
        };
        Ok(self.airports.add(MonitoredAirport { code, name }).await)
    }

    pub async fn remove_airport(&self, code: &str) -> Vec<MonitoredAirport> {
        self.airports.remove(&code.trim().to_uppercase()).await
    }

    pub async fn list_airports(&self) -> Vec<MonitoredAirport> {
        self.airports.list().await
    }

    pub async fn add_phone(&self, raw: &str) -> ApiResult<Vec<UserPhone>> {
        let number = normalize_phone(raw).ok_or_else(|| {
            ApiError::Validation(format!(
                "{:?} is not a phone number; expected 10-15 digits, optionally starting with +",
                raw
            ))
        })?;
        info!(number = %number, "Registered phone for delay alerts");
        Ok(self.phones.add(number).await)
    }

    pub async fn remove_phone(&self, raw: &str) -> Vec<UserPhone> {
        let number = normalize_phone(raw).unwrap_or_else(|| raw.trim().to_string());
        self.phones.remove(&number).await
    }

    pub async fn list_phones(&self) -> Vec<UserPhone> {
        self.phones.list().await
    }
}

/// Runs poll cycles: fetch, detect, persist, notify for each airport
pub struct FlightMonitor {
    airports: AirportRegistry,
    tracker: TrackerRepo,
    records: RecordRepo,
    phones: PhoneRepo,
    provider: Arc<dyn FlightProvider>,
    notifier: NotificationService,
    cycle_gate: Mutex<()>,
}

impl FlightMonitor {
    pub fn new(
        airports: AirportRegistry,
        tracker: TrackerRepo,
        records: RecordRepo,
        phones: PhoneRepo,
        provider: Arc<dyn FlightProvider>,
        notifier: NotificationService,
    ) -> Self {
        Self {
            airports,
            tracker,
            records,
            phones,
            provider,
            notifier,
            cycle_gate: Mutex::new(()),
        }
    }

    /// One pass over all monitored airports; never fails as a whole
    pub async fn run_cycle(&self) -> CycleSummary {
        let _running = self.cycle_gate.lock().await;
        let mut summary = CycleSummary::default();

        let airports = self.airports.list().await;
        if airports.is_empty() {
            info!("No airports being monitored.");
            return summary;
        }
        info!(airports = airports.len(), "Running scheduled flight check");

        for airport in &airports {
            match self.check_airport(&airport.code, &mut summary).await {
                Ok(()) => summary.airports_checked += 1,
                Err(e) => {
                    summary.airports_failed += 1;
                    error!(code = %airport.code, "Error checking airport: {}", e);
                }
            }
        }

        info!(
            checked = summary.airports_checked,
            failed = summary.airports_failed,
            events = summary.delay_events,
            sent = summary.notifications_sent,
            "Scheduled check completed"
        );
        summary
    }

    async fn check_airport(&self, code: &str, summary: &mut CycleSummary) -> ApiResult<()> {
        let flights = self.provider.fetch(code, Direction::Departures).await?;
        let now = Utc::now();

        let previous = self.tracker.load(code).await;
        let detection = detector::detect_delays(&flights, &previous, now);
        self.tracker.save(code, detection.next_state).await;

        if !detection.events.is_empty() {
            info!(code, count = detection.events.len(), "Found delayed flight(s)");
            for event in &detection.events {
                info!(
                    flight = %event.flight.flight_number,
                    delay = event.delay_minutes,
                    previous = event.previous_delay_minutes,
                    new = event.is_new,
                    "Delay detected"
                );
            }

            let recipients: Vec<String> =
                self.phones.list().await.into_iter().map(|p| p.number).collect();
            if recipients.is_empty() {
                warn!(code, "No registered phones, skipping notifications");
            }
            let outcomes = self.notifier.notify_all(&detection.events, &recipients).await;
            let sent = outcomes.iter().filter(|o| o.success).count();
            summary.notifications_sent += sent;
            summary.notifications_failed += outcomes.len() - sent;
        }

        self.records.append_records(code, &flights, now).await;
        info!(
            code,
            flights = flights.len(),
            events = detection.events.len(),
            "Checked airport"
        );

        summary.flights_seen += flights.len();
        summary.delay_events += detection.events.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::notifier::tests::FakeGateway;
    use super::*;
    use crate::repo::init_store;
    use crate::repo::tests::flight;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Serves queued snapshots per airport; codes without a snapshot fail
    #[derive(Default)]
    struct FakeProvider {
        snapshots: Mutex<HashMap<String, Vec<Vec<Flight>>>>,
    }

    impl FakeProvider {
        async fn push(&self, code: &str, flights: Vec<Flight>) {
            self.snapshots
                .lock()
                .await
                .entry(code.to_string())
                .or_default()
                .push(flights);
        }
    }

    #[async_trait]
    impl FlightProvider for FakeProvider {
        async fn fetch(&self, code: &str, _direction: Direction) -> ApiResult<Vec<Flight>> {
            let mut snapshots = self.snapshots.lock().await;
            match snapshots.get_mut(code) {
                Some(queue) if !queue.is_empty() => Ok(queue.remove(0)),
                _ => Err(ApiError::ProviderRateLimit),
            }
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        provider: Arc<FakeProvider>,
        gateway: Arc<FakeGateway>,
        monitor: FlightMonitor,
        settings: MonitorService,
        records: RecordRepo,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = init_store(dir.path().join("flights-data.json")).await.unwrap();
        let provider = Arc::new(FakeProvider::default());
        let gateway = Arc::new(FakeGateway::default());
        let records = RecordRepo::new(store.clone());

        let monitor = FlightMonitor::new(
            AirportRegistry::new(store.clone()),
            TrackerRepo::new(store.clone()),
            records.clone(),
            PhoneRepo::new(store.clone()),
            provider.clone(),
            NotificationService::new(gateway.clone(), Duration::from_millis(1)),
        );
        let settings = MonitorService::new(AirportRegistry::new(store.clone()), PhoneRepo::new(store));

        Harness {
            _dir: dir,
            provider,
            gateway,
            monitor,
            settings,
            records,
        }
    }

    #[tokio::test]
    async fn test_repeat_delay_not_renotified() {
        let h = harness().await;
        h.settings.add_airport("JFK", "John F. Kennedy").await.unwrap();
        h.settings.add_phone("+1 416 555 0100").await.unwrap();

        h.provider.push("JFK", vec![flight("AA100", 20)]).await;
        h.provider.push("JFK", vec![flight("AA100", 21)]).await;

        let first = h.monitor.run_cycle().await;
        assert_eq!(first.delay_events, 1);
        assert_eq!(first.notifications_sent, 1);
        {
            let sent = h.gateway.sent.lock().await;
            assert!(sent[0].1.contains("NEW DELAY"));
            assert_eq!(sent[0].0, "+14165550100");
        }

        let second = h.monitor.run_cycle().await;
        assert_eq!(second.delay_events, 0);
        assert_eq!(second.airports_checked, 1);
        assert_eq!(h.gateway.sent.lock().await.len(), 1);
        assert_eq!(h.records.load_all_records().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_airport_does_not_abort_cycle() {
        let h = harness().await;
        h.settings.add_airport("LHR", "Heathrow").await.unwrap();
        h.settings.add_airport("JFK", "John F. Kennedy").await.unwrap();
        h.provider
            .push("JFK", vec![flight("AA100", 0), flight("DL300", 30)])
            .await;

        let summary = h.monitor.run_cycle().await;
        assert_eq!(summary.airports_failed, 1);
        assert_eq!(summary.airports_checked, 1);
        assert_eq!(summary.flights_seen, 2);
        assert_eq!(summary.delay_events, 1);
        // no phones registered
        assert_eq!(summary.notifications_sent, 0);

        let records = h.records.load_all_records().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.airport_code == "JFK"));
        assert_eq!(h.records.load_trend_points().await[0].average_delay, 30.0);
    }

    #[tokio::test]
    async fn test_tracking_is_per_airport() {
        let h = harness().await;
        h.settings.add_airport("JFK", "").await.unwrap();
        h.settings.add_airport("LHR", "").await.unwrap();

        h.provider.push("JFK", vec![flight("AA100", 20)]).await;
        h.provider.push("LHR", vec![flight("BA200", 0)]).await;
        h.provider.push("JFK", vec![flight("AA100", 22)]).await;
        h.provider.push("LHR", vec![flight("BA200", 0)]).await;

        assert_eq!(h.monitor.run_cycle().await.delay_events, 1);
        assert_eq!(h.monitor.run_cycle().await.delay_events, 0);
    }

    #[tokio::test]
    async fn test_empty_registry_is_noop() {
        let h = harness().await;
        assert_eq!(h.monitor.run_cycle().await, CycleSummary::default());
    }

    #[tokio::test]
    async fn test_validation_at_boundary() {
        let h = harness().await;
        assert!(matches!(
            h.settings.add_phone("call me").await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            h.settings.add_airport("JFKX", "").await,
            Err(ApiError::Validation(_))
        ));
        assert!(h.settings.list_phones().await.is_empty());

        let list = h.settings.add_airport("jfk", "").await.unwrap();
        assert_eq!(list[0].code, "JFK");
        assert_eq!(list[0].name, "JFK");
        assert!(h.settings.remove_airport("jfk").await.is_empty());

        h.settings.add_phone("+14165550100").await.unwrap();
        h.settings.add_phone("+1 (416) 555-0100").await.unwrap();
        assert_eq!(h.settings.list_phones().await.len(), 1);
        assert!(h.settings.remove_phone("416-555-0100 ").await.len() == 1);
        assert!(h.settings.remove_phone("+1 416 555 0100").await.is_empty());
    }

    #[test]
    fn test_search_airports() {
        let service = FlightService::new(Arc::new(FakeProvider::default()));
        let codes: Vec<&str> = service.search_airports("york").iter().map(|a| a.code).collect();
        assert_eq!(codes, vec!["JFK"]);
        assert_eq!(service.search_airports("INTERNATIONAL").len(), 6);
        assert_eq!(service.popular_airports().len(), 8);
    }
}
