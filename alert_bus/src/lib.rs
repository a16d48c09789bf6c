#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Alert bus abstractions carrying unsolicited notifications between tasks.
//!
//! The alarm monitor publishes one record per triggered alarm; the console
//! session subscribes and forwards the text upstream to the controller.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::broadcast};
use uuid::Uuid;

/// One unsolicited alert, encoded as JSON when journaled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Unique identifier.
    pub id: Uuid,
    /// Subsystem raising the alert (e.g., `alarms.monitor`).
    pub source: String,
    /// Simulation universal time at which the alert was raised.
    pub raised_at: DateTime<Utc>,
    /// Text delivered to the controller, verbatim.
    pub text: String,
}

impl AlertRecord {
    /// Creates a new alert from the given source.
    #[must_use]
    pub fn new(source: impl Into<String>, raised_at: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            raised_at,
            text: text.into(),
        }
    }
}

/// Alert publisher interface.
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    /// Publishes an alert to the bus.
    async fn publish(&self, alert: AlertRecord) -> Result<()>;
}

/// Alert subscriber interface.
#[async_trait]
pub trait AlertSubscriber: Send + Sync {
    /// Starts consuming alerts. Implementations should stream until the channel closes.
    async fn subscribe(&self) -> Result<broadcast::Receiver<AlertRecord>>;
}

/// In-memory broadcast bus connecting monitor and console tasks.
#[derive(Debug, Clone)]
pub struct BroadcastAlertBus {
    sender: broadcast::Sender<AlertRecord>,
    backlog: Arc<Mutex<VecDeque<AlertRecord>>>,
    capacity: usize,
}

impl BroadcastAlertBus {
    /// Creates a new bus retaining at most `capacity` alerts in the backlog.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            backlog: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Snapshot of recent alerts retained in memory.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AlertRecord> {
        self.backlog.lock().iter().cloned().collect()
    }

    /// Opens a new receiver without going through the trait object.
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<AlertRecord> {
        self.sender.subscribe()
    }
}

/// File-backed publisher keeping a durable alert journal.
#[derive(Debug, Clone)]
pub struct FileAlertPublisher {
    path: PathBuf,
}

impl FileAlertPublisher {
    /// Creates a publisher that appends JSON lines to the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }
}

#[async_trait]
impl AlertPublisher for BroadcastAlertBus {
    async fn publish(&self, alert: AlertRecord) -> Result<()> {
        {
            let mut backlog = self.backlog.lock();
            backlog.push_back(alert.clone());
            if backlog.len() > self.capacity {
                backlog.pop_front();
            }
        }
        // No live console session is not an error; the backlog still records it.
        let _ = self.sender.send(alert);
        Ok(())
    }
}

#[async_trait]
impl AlertSubscriber for BroadcastAlertBus {
    async fn subscribe(&self) -> Result<broadcast::Receiver<AlertRecord>> {
        Ok(self.sender.subscribe())
    }
}

#[async_trait]
impl AlertPublisher for FileAlertPublisher {
    async fn publish(&self, alert: AlertRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let data = serde_json::to_vec(&alert)?;
        file.write_all(&data).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::runtime::Runtime;

    fn sample_alert() -> AlertRecord {
        AlertRecord::new("alarms.monitor", Utc::now(), "Alarm triggered: periapsis-burn")
    }

    #[test]
    fn publishes_and_receives() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let bus = BroadcastAlertBus::new(16);
            let mut rx = bus.subscribe().await.unwrap();
            bus.publish(sample_alert()).await.unwrap();
            let alert = rx.recv().await.unwrap();
            assert_eq!(alert.source, "alarms.monitor");
            assert!(alert.text.contains("periapsis-burn"));
        });
    }

    #[test]
    fn publish_without_subscribers_keeps_backlog() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let bus = BroadcastAlertBus::new(4);
            bus.publish(sample_alert()).await.unwrap();
            assert_eq!(bus.snapshot().len(), 1);
        });
    }

    #[test]
    fn backlog_is_bounded() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let bus = BroadcastAlertBus::new(2);
            for _ in 0..5 {
                bus.publish(sample_alert()).await.unwrap();
            }
            assert_eq!(bus.snapshot().len(), 2);
        });
    }

    #[test]
    fn file_publisher_writes_alerts() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempdir().unwrap();
            let path = dir.path().join("alerts.log");
            let publisher = FileAlertPublisher::new(&path).unwrap();
            publisher.publish(sample_alert()).await.unwrap();
            let content = std::fs::read_to_string(path).unwrap();
            assert!(content.contains("periapsis-burn"));
        });
    }
}
