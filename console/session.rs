//! Session state machine, dashboard, and the serve loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use satos_alert_bus::AlertRecord;
use satos_link::{DuplexChannel, EnvelopeKind, Frame, LinkError, SessionState};
use satos_logging::LogLevel;
use satos_spacecraft::{ClockSource, Met};
use serde_json::json;
use tokio::sync::{broadcast, watch};

use crate::{buffer::OutputBuffer, registry::CommandSurface, telemetry::ConsoleTelemetry};

/// Collaborator contributing one dashboard section at connect time.
pub trait StatusReporter: Send + Sync {
    /// Section heading shown on the dashboard.
    fn section(&self) -> &str;
    /// Writes the section body into the buffer.
    fn render(&self, out: &mut OutputBuffer);
}

/// Server-role session: executes controller envelopes against the command
/// surface and forwards alerts upstream out-of-band.
pub struct ConsoleSession {
    surface: Arc<dyn CommandSurface>,
    clock: Arc<dyn ClockSource>,
    launch_time: DateTime<Utc>,
    banner: String,
    reporters: Vec<Arc<dyn StatusReporter>>,
    telemetry: Option<ConsoleTelemetry>,
}

impl ConsoleSession {
    /// Creates a session over the given command surface and clock.
    #[must_use]
    pub fn new(
        surface: Arc<dyn CommandSurface>,
        clock: Arc<dyn ClockSource>,
        launch_time: DateTime<Utc>,
    ) -> Self {
        Self {
            surface,
            clock,
            launch_time,
            banner: "SatelliteOS".into(),
            reporters: Vec::new(),
            telemetry: None,
        }
    }

    /// Overrides the dashboard banner.
    #[must_use]
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    /// Registers a dashboard section.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn StatusReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: ConsoleTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Serves one controller link until the peer hangs up.
    ///
    /// The alert forwarder runs as its own task so an alert raised during a
    /// long command still reaches the controller before that command's reply.
    pub async fn serve(
        &self,
        channel: DuplexChannel,
        alerts: broadcast::Receiver<AlertRecord>,
    ) -> Result<(), LinkError> {
        let channel = Arc::new(channel);
        let (state_tx, state_rx) = watch::channel(SessionState::AwaitingConnect);
        let forwarder = tokio::spawn(forward_alerts(
            Arc::clone(&channel),
            alerts,
            state_rx,
            self.telemetry.clone(),
        ));
        let result = self.session_loop(&channel, &state_tx).await;
        forwarder.abort();
        result
    }

    async fn session_loop(
        &self,
        channel: &DuplexChannel,
        state_tx: &watch::Sender<SessionState>,
    ) -> Result<(), LinkError> {
        let mut buffer = OutputBuffer::new();
        loop {
            let frame = match channel.receive().await {
                Ok(frame) => frame,
                Err(LinkError::Closed) => {
                    state_tx.send_replace(SessionState::AwaitingConnect);
                    tracing::info!("controller link closed");
                    return Ok(());
                }
                Err(err) => return Err(err),
            };

            let Frame::Envelope(envelope) = frame else {
                tracing::warn!(?frame, "ignoring non-envelope frame from controller");
                continue;
            };

            let state = *state_tx.borrow();
            match state.accept(envelope.kind) {
                Ok(next) => {
                    match envelope.kind {
                        EnvelopeKind::Connect => {
                            state_tx.send_replace(next);
                            self.telemetry(LogLevel::Info, "console.session.connect", json!({}));
                            buffer.clear();
                            self.render_dashboard(&mut buffer).await;
                            channel
                                .send(&Frame::Reply {
                                    text: buffer.drain(),
                                })
                                .await?;
                        }
                        EnvelopeKind::Command => {
                            let line = envelope.data.unwrap_or_default();
                            self.telemetry(
                                LogLevel::Info,
                                "console.session.command",
                                json!({ "line": line }),
                            );
                            self.surface.execute(&line, &mut buffer).await;
                            channel
                                .send(&Frame::Reply {
                                    text: buffer.drain(),
                                })
                                .await?;
                        }
                        EnvelopeKind::Disconnect => {
                            state_tx.send_replace(next);
                            self.telemetry(LogLevel::Info, "console.session.disconnect", json!({}));
                        }
                    }
                }
                Err(violation) => {
                    // Never execute out-of-state messages; answer with the
                    // fault so the peer unblocks, and leave state untouched.
                    self.telemetry(
                        LogLevel::Warn,
                        "console.session.protocol_violation",
                        json!({ "kind": format!("{:?}", envelope.kind) }),
                    );
                    tracing::warn!(error = %violation, "protocol violation");
                    channel
                        .send(&Frame::Reply {
                            text: format!("ERROR: {violation}"),
                        })
                        .await?;
                }
            }
        }
    }

    async fn render_dashboard(&self, out: &mut OutputBuffer) {
        out.push(self.banner.clone());
        match self.clock.now() {
            Ok(ut) => out.push(format!(
                "UT: {} | MET: {}",
                ut.to_rfc3339(),
                Met::since(self.launch_time, ut)
            )),
            Err(err) => out.push_error(format!("clock unavailable: {err}")),
        }
        out.push("");
        for reporter in &self.reporters {
            out.push(format!("{}:", reporter.section()));
            reporter.render(out);
            out.push("");
        }
        self.surface.execute("help", out).await;
    }

    fn telemetry(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            if let Err(err) = telemetry.log(level, message, metadata) {
                tracing::warn!(error = %err, "telemetry write failed");
            }
        }
    }
}

/// Pushes bus alerts over the channel while a session is connected.
///
/// Alerts bypass the output buffer entirely; they are whole frames and can
/// interleave with a command in flight without damaging its reply.
async fn forward_alerts(
    channel: Arc<DuplexChannel>,
    mut alerts: broadcast::Receiver<AlertRecord>,
    state: watch::Receiver<SessionState>,
    telemetry: Option<ConsoleTelemetry>,
) {
    loop {
        match alerts.recv().await {
            Ok(alert) => {
                if state.borrow().is_connected() {
                    if let Err(err) = channel
                        .send(&Frame::Alert {
                            text: alert.text.clone(),
                        })
                        .await
                    {
                        tracing::warn!(error = %err, "alert send failed, stopping forwarder");
                        return;
                    }
                    if let Some(telemetry) = &telemetry {
                        let _ = telemetry.log(
                            LogLevel::Info,
                            "console.alert.forwarded",
                            json!({ "source": alert.source }),
                        );
                    }
                } else {
                    tracing::warn!(source = %alert.source, "alert dropped: no controller session");
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "alert forwarder lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CommandHandler, CommandRegistry, FnCommand};
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use satos_alert_bus::{AlertPublisher, BroadcastAlertBus};
    use satos_link::{Envelope, LinkListener};
    use satos_spacecraft::SimClock;
    use std::net::SocketAddr;
    use std::time::Duration;

    struct NapCommand;

    #[async_trait]
    impl CommandHandler for NapCommand {
        async fn run(&self, _args: &str, out: &mut OutputBuffer) -> AnyResult<()> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            out.push("rested");
            Ok(())
        }
    }

    fn launch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1951, 1, 1, 0, 0, 0).unwrap()
    }

    fn test_session() -> Arc<ConsoleSession> {
        let registry = CommandRegistry::new();
        registry.register(
            "echo",
            "Write the arguments back",
            Arc::new(FnCommand(|args: &str, out: &mut OutputBuffer| {
                out.push(args.to_owned());
                Ok(())
            })),
        );
        registry.register("nap", "Sleep briefly then report", Arc::new(NapCommand));
        let clock = Arc::new(SimClock::new(launch()));
        Arc::new(ConsoleSession::new(Arc::new(registry), clock, launch()))
    }

    async fn spawn_console(
        session: Arc<ConsoleSession>,
        bus: &BroadcastAlertBus,
    ) -> SocketAddr {
        let listener = LinkListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let alerts = bus.receiver();
        tokio::spawn(async move {
            let channel = listener.accept().await.unwrap();
            let _ = session.serve(channel, alerts).await;
        });
        addr
    }

    async fn connect_client(addr: SocketAddr) -> DuplexChannel {
        DuplexChannel::connect(addr).await.unwrap()
    }

    #[tokio::test]
    async fn connect_replies_with_dashboard() {
        let bus = BroadcastAlertBus::new(16);
        let addr = spawn_console(test_session(), &bus).await;
        let client = connect_client(addr).await;

        client
            .send(&Frame::Envelope(Envelope::connect()))
            .await
            .unwrap();
        let Frame::Reply { text } = client.receive().await.unwrap() else {
            panic!("expected dashboard reply");
        };
        assert!(text.contains("SatelliteOS"));
        assert!(text.contains("MET: T+ 0Y, 000D, 00:00:00"));
        assert!(text.contains("Available commands:"));
    }

    #[tokio::test]
    async fn round_trip_echo_command() {
        let bus = BroadcastAlertBus::new(16);
        let addr = spawn_console(test_session(), &bus).await;
        let client = connect_client(addr).await;

        client
            .send(&Frame::Envelope(Envelope::connect()))
            .await
            .unwrap();
        client.receive().await.unwrap();

        client
            .send(&Frame::Envelope(Envelope::command("echo hello")))
            .await
            .unwrap();
        let Frame::Reply { text } = client.receive().await.unwrap() else {
            panic!("expected command reply");
        };
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn command_before_connect_is_rejected_not_executed() {
        let bus = BroadcastAlertBus::new(16);
        let addr = spawn_console(test_session(), &bus).await;
        let client = connect_client(addr).await;

        client
            .send(&Frame::Envelope(Envelope::command("echo hello")))
            .await
            .unwrap();
        let Frame::Reply { text } = client.receive().await.unwrap() else {
            panic!("expected violation reply");
        };
        assert!(text.starts_with("ERROR:"));
        assert!(text.contains("not valid"));

        // The session is still usable afterwards.
        client
            .send(&Frame::Envelope(Envelope::connect()))
            .await
            .unwrap();
        let Frame::Reply { text } = client.receive().await.unwrap() else {
            panic!("expected dashboard reply");
        };
        assert!(text.contains("SatelliteOS"));
    }

    #[tokio::test]
    async fn command_after_disconnect_is_rejected() {
        let bus = BroadcastAlertBus::new(16);
        let addr = spawn_console(test_session(), &bus).await;
        let client = connect_client(addr).await;

        client
            .send(&Frame::Envelope(Envelope::connect()))
            .await
            .unwrap();
        client.receive().await.unwrap();
        client
            .send(&Frame::Envelope(Envelope::disconnect()))
            .await
            .unwrap();
        client
            .send(&Frame::Envelope(Envelope::command("echo hello")))
            .await
            .unwrap();
        let Frame::Reply { text } = client.receive().await.unwrap() else {
            panic!("expected violation reply");
        };
        assert!(text.contains("not valid"));
    }

    #[tokio::test]
    async fn alert_bypasses_an_inflight_command() {
        let bus = BroadcastAlertBus::new(16);
        let addr = spawn_console(test_session(), &bus).await;
        let client = connect_client(addr).await;

        client
            .send(&Frame::Envelope(Envelope::connect()))
            .await
            .unwrap();
        client.receive().await.unwrap();

        client
            .send(&Frame::Envelope(Envelope::command("nap")))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        bus.publish(AlertRecord::new("alarms.monitor", launch(), "ALARM TRIGGERED: T+60"))
            .await
            .unwrap();

        let first = client.receive().await.unwrap();
        let second = client.receive().await.unwrap();
        assert_eq!(
            first,
            Frame::Alert {
                text: "ALARM TRIGGERED: T+60".into()
            }
        );
        assert_eq!(
            second,
            Frame::Reply {
                text: "rested".into()
            }
        );
    }

    #[tokio::test]
    async fn alerts_are_dropped_while_disconnected() {
        let bus = BroadcastAlertBus::new(16);
        let addr = spawn_console(test_session(), &bus).await;
        let client = connect_client(addr).await;

        bus.publish(AlertRecord::new("alarms.monitor", launch(), "early alert"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        client
            .send(&Frame::Envelope(Envelope::connect()))
            .await
            .unwrap();
        let Frame::Reply { text } = client.receive().await.unwrap() else {
            panic!("expected dashboard reply");
        };
        assert!(text.contains("SatelliteOS"));

        let nothing = tokio::time::timeout(Duration::from_millis(100), client.receive()).await;
        assert!(nothing.is_err(), "no stray alert should arrive");
    }
}
