/// Delay-change detection between successive snapshots
use crate::domain::{DelayEvent, Flight, TrackedFlight, TrackedFlightState};
use chrono::{DateTime, Utc};

/// Minimum delay (minutes) for a flight to be eligible for notification
pub const DELAY_THRESHOLD: u32 = 15;

/// Growth (minutes) of an existing delay that warrants another notification
pub const DELAY_ESCALATION: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub events: Vec<DelayEvent>,
    /// Replaces the previous state wholesale
    pub next_state: TrackedFlightState,
}

/// Compare a fresh snapshot with the previous tracked state
pub fn detect_delays(
    current: &[Flight],
    previous: &TrackedFlightState,
    now: DateTime<Utc>,
) -> Detection {
    let events = current
        .iter()
        .filter_map(|flight| {
            let delay = flight.departure.delay_minutes;
            if delay < DELAY_THRESHOLD {
                return None;
            }

            let prev = previous.get(&flight.flight_number);
            let notify = match prev {
                None => true,
                Some(p) => {
                    p.delay_minutes < DELAY_THRESHOLD
                        || delay.saturating_sub(p.delay_minutes) >= DELAY_ESCALATION
                }
            };

            notify.then(|| DelayEvent {
                flight: flight.clone(),
                delay_minutes: delay,
                previous_delay_minutes: prev.map(|p| p.delay_minutes).unwrap_or(0),
                is_new: prev.is_none(),
            })
        })
        .collect();

    let next_state = current
        .iter()
        .map(|flight| {
            (
                flight.flight_number.clone(),
                TrackedFlight {
                    delay_minutes: flight.departure.delay_minutes,
                    status: flight.status,
                    last_checked: now,
                },
            )
        })
        .collect();

    Detection { events, next_state }
}

/// SMS body for one delay event
pub fn format_delay_message(event: &DelayEvent) -> String {
    let flight = &event.flight;
    let header = if event.is_new {
        "NEW DELAY"
    } else {
        "DELAY UPDATE"
    };

    format!(
        "FLIGHT {}\n\n{} ({})\n{} → {}\nDelay: {} min\nNew time: {}",
        header,
        flight.flight_number,
        flight.airline,
        flight.departure.iata,
        flight.arrival.iata,
        event.delay_minutes,
        flight.departure.estimated_time.as_deref().unwrap_or("TBA"),
    )
}
