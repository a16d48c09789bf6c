//! Background polling loop raising one alert per expired alarm.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use satos_alert_bus::{AlertPublisher, AlertRecord};
use satos_spacecraft::ClockSource;
use tokio::task::JoinHandle;

use crate::store::{Alarm, AlarmStore};

const SOURCE: &str = "alarms.monitor";

/// Polls the store against the simulation clock and fires each alarm exactly once.
///
/// The clock may jump forward arbitrarily far between polls or jump backward
/// across a state reload; a triggered alarm never re-arms either way.
pub struct AlarmMonitor {
    store: AlarmStore,
    clock: Arc<dyn ClockSource>,
    publisher: Arc<dyn AlertPublisher>,
    poll_interval: Duration,
}

impl AlarmMonitor {
    /// Creates a monitor with the default 1 second poll cadence.
    #[must_use]
    pub fn new(
        store: AlarmStore,
        clock: Arc<dyn ClockSource>,
        publisher: Arc<dyn AlertPublisher>,
    ) -> Self {
        Self {
            store,
            clock,
            publisher,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Overrides the poll cadence.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Spawns the poll loop; it runs for the lifetime of the process.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.poll_once().await;
            }
        })
    }

    /// Runs one poll: reads the clock and sweeps due alarms.
    ///
    /// A clock read failure skips the tick; a failure on one alarm does not
    /// abort the sweep over the rest.
    pub async fn poll_once(&self) {
        let now = match self.clock.now() {
            Ok(now) => now,
            Err(err) => {
                tracing::warn!(error = %err, "clock read failed, retrying next tick");
                return;
            }
        };

        for alarm in self.store.due(now) {
            match self.store.mark_triggered(alarm.id) {
                Ok(snapshot) => {
                    let alert = AlertRecord::new(SOURCE, now, render_alert(now, &snapshot));
                    if let Err(err) = self.publisher.publish(alert).await {
                        tracing::warn!(alarm = %snapshot.name, error = %err, "alert publish failed");
                    }
                }
                Err(err) => {
                    // Removed between the sweep read and the mark; nothing to fire.
                    tracing::warn!(alarm = %alarm.name, error = %err, "alarm vanished during sweep");
                }
            }
        }
    }
}

/// Renders the alert text sent upstream for one triggered alarm.
#[must_use]
pub fn render_alert(now: DateTime<Utc>, alarm: &Alarm) -> String {
    let snapshot = serde_json::to_string_pretty(alarm)
        .unwrap_or_else(|_| format!("{{\"name\": \"{}\"}}", alarm.name));
    format!("{} | ALARM TRIGGERED:\n{snapshot}", now.to_rfc3339())
}
