/// Rolling analytics over the bounded flight history
use crate::domain::{
    AnalyticsReport, DelayTrendPoint, FlightRecord, FlightStatus, Ranking, RecentDelay,
    StatusDistribution, TimeFilter,
};
use crate::repo::RecordRepo;
use crate::services::detector::DELAY_THRESHOLD;
use crate::utils::{round1, scheduled_hour};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

const TOP_AIRLINES: usize = 5;
const TOP_DESTINATIONS: usize = 5;
const RECENT_DELAYS: usize = 20;

pub struct AnalyticsService {
    records: RecordRepo,
}

impl AnalyticsService {
    pub fn new(records: RecordRepo) -> Self {
        Self { records }
    }

    pub async fn generate_report(&self, filter: TimeFilter) -> AnalyticsReport {
        let records = self.records.load_all_records().await;
        let trends = self.records.load_trend_points().await;
        build_report(&records, trends, filter, Utc::now())
    }
}

/// Pure rollup of `records` for the window ending at `now`.
///
/// `trends` is passed through untouched; the trend series is not windowed.
pub fn build_report(
    records: &[FlightRecord],
    trends: Vec<DelayTrendPoint>,
    filter: TimeFilter,
    now: DateTime<Utc>,
) -> AnalyticsReport {
    let cutoff = filter.cutoff(now);
    let matching: Vec<&FlightRecord> = records
        .iter()
        .filter(|r| cutoff.map_or(true, |c| r.timestamp >= c))
        .collect();

    if matching.is_empty() {
        return AnalyticsReport::default();
    }

    let total = matching.len();
    let delayed: Vec<&FlightRecord> = matching
        .iter()
        .copied()
        .filter(|r| r.delay_minutes > 0)
        .collect();
    let on_time = total - delayed.len();

    let average_delay = if delayed.is_empty() {
        0.0
    } else {
        let sum: u64 = delayed.iter().map(|r| u64::from(r.delay_minutes)).sum();
        round1(sum as f64 / delayed.len() as f64)
    };

    let mut status_distribution = StatusDistribution::default();
    for r in &matching {
        match r.status {
            FlightStatus::Cancelled => status_distribution.cancelled += 1,
            FlightStatus::Active => status_distribution.active += 1,
            _ if r.delay_minutes > 0 => status_distribution.delayed += 1,
            _ => status_distribution.on_time += 1,
        }
    }

    let mut airline_totals: Tally<(u64, u64)> = Tally::default();
    for r in &delayed {
        let (sum, count) = airline_totals.entry(&r.airline, (0, 0));
        *sum += u64::from(r.delay_minutes);
        *count += 1;
    }
    let airline_means = airline_totals
        .into_entries()
        .into_iter()
        .map(|(airline, (sum, count))| (airline, (sum as f64 / count as f64).round() as u32))
        .collect();
    let airline_delays = top_n(airline_means, TOP_AIRLINES);

    let mut hourly_distribution = BTreeMap::new();
    for hour in matching
        .iter()
        .filter_map(|r| r.scheduled_time.as_deref().and_then(scheduled_hour))
    {
        *hourly_distribution.entry(hour).or_insert(0) += 1;
    }

    let mut destinations: Tally<usize> = Tally::default();
    for r in &matching {
        *destinations.entry(&r.arrival_iata, 0) += 1;
    }
    let top_destinations = top_n(destinations.into_entries(), TOP_DESTINATIONS);

    let mut severe: Vec<&FlightRecord> = delayed
        .iter()
        .copied()
        .filter(|r| r.delay_minutes >= DELAY_THRESHOLD)
        .collect();
    severe.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let recent_delays = severe
        .into_iter()
        .take(RECENT_DELAYS)
        .map(|r| RecentDelay {
            flight_number: r.flight_number.clone(),
            airline: r.airline.clone(),
            departure: r.departure_iata.clone(),
            arrival: r.arrival_iata.clone(),
            delay: r.delay_minutes,
            timestamp: r.timestamp,
        })
        .collect();

    AnalyticsReport {
        total_flights: total,
        delayed_flights: delayed.len(),
        on_time_flights: on_time,
        average_delay,
        on_time_percentage: round1(on_time as f64 / total as f64 * 100.0),
        status_distribution,
        airline_delays,
        delay_trends: trends,
        hourly_distribution,
        top_destinations,
        recent_delays,
    }
}

/// Keyed accumulator that remembers first-seen order
struct Tally<V> {
    index: HashMap<String, usize>,
    entries: Vec<(String, V)>,
}

impl<V> Default for Tally<V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<V> Tally<V> {
    fn entry(&mut self, key: &str, init: V) -> &mut V {
        let i = match self.index.get(key) {
            Some(i) => *i,
            None => {
                self.entries.push((key.to_string(), init));
                self.index.insert(key.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[i].1
    }

    fn into_entries(self) -> Vec<(String, V)> {
        self.entries
    }
}

/// Stable descending sort; ties keep first-seen order
fn top_n<V: Ord + Copy>(mut entries: Vec<(String, V)>, n: usize) -> Ranking<V> {
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(n);
    Ranking(entries)
}
