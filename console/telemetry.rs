//! Mission-log telemetry handle for console events.

use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use satos_logging::{JsonLogger, LogLevel, LogRecord};
use satos_spacecraft::ClockSource;
use serde_json::Value;

/// Builder for the console telemetry handle.
pub struct ConsoleTelemetryBuilder {
    subsystem: String,
    log_path: Option<PathBuf>,
    clock: Option<Arc<dyn ClockSource>>,
}

impl ConsoleTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(subsystem: impl Into<String>) -> Self {
        Self {
            subsystem: subsystem.into(),
            log_path: None,
            clock: None,
        }
    }

    /// Sets the mission log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Attaches a clock so records carry the simulation time.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<ConsoleTelemetry> {
        let logger = match self.log_path {
            Some(path) => Some(JsonLogger::new(path)?),
            None => None,
        };
        Ok(ConsoleTelemetry {
            inner: Arc::new(TelemetryInner {
                subsystem: self.subsystem,
                logger,
                clock: self.clock,
            }),
        })
    }
}

/// Telemetry handle shared by the session loop and the alert forwarder.
#[derive(Clone)]
pub struct ConsoleTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for ConsoleTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleTelemetry")
            .field("subsystem", &self.inner.subsystem)
            .finish()
    }
}

struct TelemetryInner {
    subsystem: String,
    logger: Option<JsonLogger>,
    clock: Option<Arc<dyn ClockSource>>,
}

impl ConsoleTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(subsystem: impl Into<String>) -> ConsoleTelemetryBuilder {
        ConsoleTelemetryBuilder::new(subsystem)
    }

    /// Logs structured metadata, stamped with the simulation time when available.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let mut record = LogRecord::new(&self.inner.subsystem, level, message);
            if let Some(obj) = metadata.as_object() {
                record.metadata = obj.clone();
            }
            if let Some(clock) = &self.inner.clock {
                if let Ok(now) = clock.now() {
                    record = record.at_sim_time(now);
                }
            }
            logger.log(&record)?;
        }
        Ok(())
    }
}
