/// Fanout of delay events to registered recipients
use crate::clients::MessageGateway;
use crate::domain::{DelayEvent, DeliveryOutcome};
use crate::services::detector::format_delay_message;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

pub struct NotificationService {
    gateway: Arc<dyn MessageGateway>,
    send_interval: Duration,
}

impl NotificationService {
    pub fn new(gateway: Arc<dyn MessageGateway>, send_interval: Duration) -> Self {
        Self {
            gateway,
            send_interval,
        }
    }

    /// Send every event to every recipient, one attempt per pair.
    ///
    /// Sends are paced by a fixed-interval ticker; the first goes out
    /// immediately. Failures are recorded and never stop the loop.
    pub async fn notify_all(
        &self,
        events: &[DelayEvent],
        recipients: &[String],
    ) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(events.len() * recipients.len());
        if events.is_empty() || recipients.is_empty() {
            return outcomes;
        }

        let mut ticker = interval(self.send_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for event in events {
            let text = format_delay_message(event);
            let flight_number = &event.flight.flight_number;

            for recipient in recipients {
                ticker.tick().await;

                let outcome = match self.gateway.deliver(recipient, &text).await {
                    Ok(id) => {
                        info!(recipient = %recipient, flight = %flight_number, sid = %id, "SMS sent");
                        DeliveryOutcome {
                            recipient: recipient.clone(),
                            flight_number: flight_number.clone(),
                            success: true,
                            id: Some(id),
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!(recipient = %recipient, flight = %flight_number, "Failed to send SMS: {}", e);
                        DeliveryOutcome {
                            recipient: recipient.clone(),
                            flight_number: flight_number.clone(),
                            success: false,
                            id: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
                outcomes.push(outcome);
            }
        }

        outcomes
    }
}
