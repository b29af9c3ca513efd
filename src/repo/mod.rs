/// Repository layer over the single durable state file
use crate::domain::{
    AirportHistoryEntry, DelayTrendPoint, Flight, FlightRecord, MonitoredAirport,
    TrackedFlightState, UserPhone,
};
use crate::errors::{ApiError, ApiResult};
use crate::utils::round1;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

pub const MAX_FLIGHT_RECORDS: usize = 10_000;
pub const MAX_TREND_POINTS: usize = 365;
pub const MAX_AIRPORT_HISTORY: usize = 100;

/// Everything that survives a restart
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreState {
    pub monitored_airports: Vec<MonitoredAirport>,
    /// Airport code -> tracked flights seen at that airport's last poll
    pub previous_flights: HashMap<String, TrackedFlightState>,
    pub flight_records: VecDeque<FlightRecord>,
    pub delay_trends: VecDeque<DelayTrendPoint>,
    pub flight_history: HashMap<String, VecDeque<AirportHistoryEntry>>,
    pub user_phones: Vec<UserPhone>,
}

/// Shared handle to the in-memory state and its backing file
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    state: RwLock<StoreState>,
    write_gate: Mutex<()>,
}

/// Open the store, loading prior state when the file exists
pub async fn init_store(path: impl AsRef<Path>) -> ApiResult<Store> {
    let path = path.as_ref().to_path_buf();

    let state = match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let state: StoreState = serde_json::from_slice(&bytes).map_err(|e| {
                ApiError::Persistence(format!(
                    "{} is not a readable state file: {}",
                    path.display(),
                    e
                ))
            })?;
            info!(
                path = %path.display(),
                airports = state.monitored_airports.len(),
                records = state.flight_records.len(),
                "Loaded existing data from file"
            );
            state
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No data file yet, starting empty");
            StoreState::default()
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Store {
        inner: Arc::new(StoreInner {
            path,
            state: RwLock::new(state),
            write_gate: Mutex::new(()),
        }),
    })
}

impl Store {
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Run a read-only closure against the current state
    pub async fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let state = self.inner.state.read().await;
        f(&*state)
    }

    /// Apply a mutation in memory, then flush the whole state to disk.
    ///
    /// A failed flush is logged; the in-memory change stands and is written
    /// out again by the next successful flush.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let _gate = self.inner.write_gate.lock().await;

        let (result, encoded) = {
            let mut state = self.inner.state.write().await;
            let result = f(&mut *state);
            (result, serde_json::to_vec_pretty(&*state))
        };

        let flushed = match encoded {
            Ok(bytes) => write_atomic(&self.inner.path, &bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = flushed {
            error!(path = %self.inner.path.display(), "Error saving data: {}", e);
        }

        result
    }

    /// Flush the current state, surfacing any write error
    pub async fn flush(&self) -> ApiResult<()> {
        let _gate = self.inner.write_gate.lock().await;
        let bytes = {
            let state = self.inner.state.read().await;
            serde_json::to_vec_pretty(&*state)?
        };
        write_atomic(&self.inner.path, &bytes).await
    }
}

/// Write to a sibling temp file, then rename over the target
async fn write_atomic(path: &Path, bytes: &[u8]) -> ApiResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "State flushed");
    Ok(())
}

fn trim_front<T>(items: &mut VecDeque<T>, max: usize) {
    while items.len() > max {
        items.pop_front();
    }
}

/// Bounded flight history and delay trend series
#[derive(Clone)]
pub struct RecordRepo {
    store: Store,
}

impl RecordRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Append one snapshot's worth of records and its trend point
    pub async fn append_records(
        &self,
        airport_code: &str,
        flights: &[Flight],
        timestamp: DateTime<Utc>,
    ) {
        self.store
            .mutate(|state| {
                state.flight_records.extend(
                    flights
                        .iter()
                        .map(|f| FlightRecord::from_flight(airport_code, f, timestamp)),
                );
                trim_front(&mut state.flight_records, MAX_FLIGHT_RECORDS);

                let delays: Vec<u32> = flights
                    .iter()
                    .map(|f| f.departure.delay_minutes)
                    .filter(|d| *d > 0)
                    .collect();
                if !delays.is_empty() {
                    let total: u64 = delays.iter().map(|d| u64::from(*d)).sum();
                    state.delay_trends.push_back(DelayTrendPoint {
                        timestamp,
                        average_delay: round1(total as f64 / delays.len() as f64),
                    });
                    trim_front(&mut state.delay_trends, MAX_TREND_POINTS);
                }

                let history = state
                    .flight_history
                    .entry(airport_code.to_string())
                    .or_default();
                history.push_back(AirportHistoryEntry {
                    timestamp,
                    flight_count: flights.len(),
                });
                trim_front(history, MAX_AIRPORT_HISTORY);
            })
            .await;
    }

    /// Full bounded history in append order
    pub async fn load_all_records(&self) -> Vec<FlightRecord> {
        self.store
            .read(|state| state.flight_records.iter().cloned().collect())
            .await
    }

    pub async fn load_trend_points(&self) -> Vec<DelayTrendPoint> {
        self.store
            .read(|state| state.delay_trends.iter().cloned().collect())
            .await
    }

    pub async fn airport_history(&self, airport_code: &str) -> Vec<AirportHistoryEntry> {
        self.store
            .read(|state| {
                state
                    .flight_history
                    .get(airport_code)
                    .map(|h| h.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .await
    }
}

/// Last observed state per flight, kept per airport
#[derive(Clone)]
pub struct TrackerRepo {
    store: Store,
}

impl TrackerRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn load(&self, airport_code: &str) -> TrackedFlightState {
        self.store
            .read(|state| {
                state
                    .previous_flights
                    .get(airport_code)
                    .cloned()
                    .unwrap_or_default()
            })
            .await
    }

    /// Replace the airport's tracked state wholesale
    pub async fn save(&self, airport_code: &str, tracked: TrackedFlightState) {
        self.store
            .mutate(|state| {
                state
                    .previous_flights
                    .insert(airport_code.to_string(), tracked);
            })
            .await;
    }
}

/// Ordered, duplicate-free list of monitored airports
#[derive(Clone)]
pub struct AirportRegistry {
    store: Store,
}

impl AirportRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Vec<MonitoredAirport> {
        self.store
            .read(|state| state.monitored_airports.clone())
            .await
    }

    /// Returns the current list; an already-monitored code leaves it unchanged
    pub async fn add(&self, airport: MonitoredAirport) -> Vec<MonitoredAirport> {
        let exists = self
            .store
            .read(|state| {
                state
                    .monitored_airports
                    .iter()
                    .any(|a| a.code == airport.code)
            })
            .await;
        if exists {
            return self.list().await;
        }

        self.store
            .mutate(|state| {
                if !state
                    .monitored_airports
                    .iter()
                    .any(|a| a.code == airport.code)
                {
                    info!(code = %airport.code, "Added airport to monitoring");
                    state.monitored_airports.push(airport);
                }
                state.monitored_airports.clone()
            })
            .await
    }

    pub async fn remove(&self, code: &str) -> Vec<MonitoredAirport> {
        self.store
            .mutate(|state| {
                state.monitored_airports.retain(|a| a.code != code);
                state.previous_flights.remove(code);
                info!(code, "Removed airport from monitoring");
                state.monitored_airports.clone()
            })
            .await
    }
}

/// Registered notification recipients
#[derive(Clone)]
pub struct PhoneRepo {
    store: Store,
}

impl PhoneRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Vec<UserPhone> {
        self.store.read(|state| state.user_phones.clone()).await
    }

    /// Insert an already-normalized number; duplicates are ignored
    pub async fn add(&self, number: String) -> Vec<UserPhone> {
        self.store
            .mutate(|state| {
                if !state.user_phones.iter().any(|p| p.number == number) {
                    state.user_phones.push(UserPhone { number });
                }
                state.user_phones.clone()
            })
            .await
    }

    pub async fn remove(&self, number: &str) -> Vec<UserPhone> {
        self.store
            .mutate(|state| {
                state.user_phones.retain(|p| p.number != number);
                state.user_phones.clone()
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{ArrivalInfo, DepartureInfo, FlightStatus, TrackedFlight};
    use chrono::Duration;

    pub(crate) fn flight(number: &str, delay: u32) -> Flight {
        Flight {
            flight_number: number.to_string(),
            airline: "American Airlines".to_string(),
            departure: DepartureInfo {
                airport: "John F Kennedy International".to_string(),
                iata: "JFK".to_string(),
                scheduled_time: Some("2024-01-15T10:30:00+00:00".to_string()),
                estimated_time: None,
                actual_time: None,
                delay_minutes: delay,
                terminal: "8".to_string(),
                gate: "N/A".to_string(),
            },
            arrival: ArrivalInfo {
                airport: "Heathrow".to_string(),
                iata: "LHR".to_string(),
                scheduled_time: None,
                estimated_time: None,
                actual_time: None,
                terminal: "N/A".to_string(),
                gate: "N/A".to_string(),
            },
            status: FlightStatus::Scheduled,
            aircraft: "N/A".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = init_store(dir.path().join("flights-data.json")).await.unwrap();
        assert!(RecordRepo::new(store.clone()).load_all_records().await.is_empty());
        assert!(AirportRegistry::new(store).list().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flights-data.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            init_store(&path).await,
            Err(ApiError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_layout_rejected_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flights-data.json");
        let legacy = serde_json::json!({
            "monitoredAirports": [{"code": "JFK", "name": "JFK"}],
            "previousFlights": {"AA100": {"delay": 20, "status": "active"}},
            "flightHistory": {}
        });
        std::fs::write(&path, legacy.to_string()).unwrap();

        match init_store(&path).await {
            Err(ApiError::Persistence(msg)) => assert!(msg.contains("flights-data.json")),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("legacy layout should not load"),
        }
    }

    #[tokio::test]
    async fn test_history_bounded_keeps_newest_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = init_store(dir.path().join("data.json")).await.unwrap();
        let records = RecordRepo::new(store);
        let start = Utc::now();

        // 201 cycles of 50 flights = 10,050 records
        for cycle in 0..201 {
            let flights: Vec<Flight> = (0..50)
                .map(|i| flight(&format!("F{}-{}", cycle, i), 0))
                .collect();
            records
                .append_records("JFK", &flights, start + Duration::seconds(cycle))
                .await;
        }

        let all = records.load_all_records().await;
        assert_eq!(all.len(), MAX_FLIGHT_RECORDS);
        assert_eq!(all[0].flight_number, "F1-0");
        assert_eq!(all.last().unwrap().flight_number, "F200-49");
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(records.airport_history("JFK").await.len(), MAX_AIRPORT_HISTORY);
    }

    #[tokio::test]
    async fn test_trend_point_averages_delayed_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = init_store(dir.path().join("data.json")).await.unwrap();
        let records = RecordRepo::new(store);
        let now = Utc::now();

        records
            .append_records("JFK", &[flight("A", 0), flight("B", 0)], now)
            .await;
        assert!(records.load_trend_points().await.is_empty());

        records
            .append_records(
                "JFK",
                &[flight("A", 10), flight("B", 0), flight("C", 25), flight("D", 20)],
                now,
            )
            .await;
        let trends = records.load_trend_points().await;
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].average_delay, 18.3);
    }

    #[tokio::test]
    async fn test_trend_points_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let store = init_store(dir.path().join("data.json")).await.unwrap();
        let records = RecordRepo::new(store);
        let start = Utc::now();

        for i in 0..400 {
            records
                .append_records("JFK", &[flight("A", i + 1)], start + Duration::minutes(i as i64))
                .await;
        }
        let trends = records.load_trend_points().await;
        assert_eq!(trends.len(), MAX_TREND_POINTS);
        assert_eq!(trends[0].average_delay, 36.0);
    }

    #[tokio::test]
    async fn test_state_survives_reopen_without_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flights-data.json");
        {
            let store = init_store(&path).await.unwrap();
            AirportRegistry::new(store.clone())
                .add(MonitoredAirport {
                    code: "JFK".into(),
                    name: "John F. Kennedy International Airport".into(),
                })
                .await;
            PhoneRepo::new(store.clone()).add("+14165550100".into()).await;
            let mut tracked = TrackedFlightState::new();
            tracked.insert(
                "AA100".into(),
                TrackedFlight {
                    delay_minutes: 20,
                    status: FlightStatus::Active,
                    last_checked: Utc::now(),
                },
            );
            TrackerRepo::new(store.clone()).save("JFK", tracked).await;
            RecordRepo::new(store)
                .append_records("JFK", &[flight("AA100", 20)], Utc::now())
                .await;
        }

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["flights-data.json".to_string()]);

        let store = init_store(&path).await.unwrap();
        assert_eq!(AirportRegistry::new(store.clone()).list().await.len(), 1);
        assert_eq!(PhoneRepo::new(store.clone()).list().await.len(), 1);
        assert_eq!(
            TrackerRepo::new(store.clone()).load("JFK").await["AA100"].delay_minutes,
            20
        );
        assert_eq!(RecordRepo::new(store.clone()).load_all_records().await.len(), 1);
        assert_eq!(RecordRepo::new(store).load_trend_points().await.len(), 1);
    }

    #[tokio::test]
    async fn test_registry_add_is_idempotent_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = init_store(dir.path().join("data.json")).await.unwrap();
        let registry = AirportRegistry::new(store);
        let jfk = MonitoredAirport {
            code: "JFK".into(),
            name: "JFK".into(),
        };
        let lhr = MonitoredAirport {
            code: "LHR".into(),
            name: "Heathrow".into(),
        };

        registry.add(jfk.clone()).await;
        registry.add(lhr.clone()).await;
        let again = registry
            .add(MonitoredAirport {
                code: "JFK".into(),
                name: "renamed".into(),
            })
            .await;
        assert_eq!(again, vec![jfk.clone(), lhr.clone()]);

        assert_eq!(registry.remove("JFK").await, vec![lhr]);
        assert_eq!(registry.remove("XXX").await.len(), 1);
    }

    #[tokio::test]
    async fn test_tracker_save_replaces_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = init_store(dir.path().join("data.json")).await.unwrap();
        let tracker = TrackerRepo::new(store);
        let entry = |delay| TrackedFlight {
            delay_minutes: delay,
            status: FlightStatus::Scheduled,
            last_checked: Utc::now(),
        };

        let mut first = TrackedFlightState::new();
        first.insert("AA100".into(), entry(5));
        first.insert("BA200".into(), entry(0));
        tracker.save("JFK", first).await;

        let mut second = TrackedFlightState::new();
        second.insert("BA200".into(), entry(30));
        tracker.save("JFK", second).await;

        let loaded = tracker.load("JFK").await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["BA200"].delay_minutes, 30);
        assert!(tracker.load("LHR").await.is_empty());
    }

    #[tokio::test]
    async fn test_flush_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("data.json");
        let store = init_store(&path).await.unwrap();
        let phones = PhoneRepo::new(store.clone());

        phones.add("+14165550100".into()).await;
        assert_eq!(phones.list().await.len(), 1);
        assert!(store.flush().await.is_err());
    }
}
