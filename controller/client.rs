//! Client-role link with reply/alert routing and bounded reply waits.

use std::{sync::Arc, time::Duration};

use satos_link::{DuplexChannel, Envelope, EnvelopeKind, Frame, LinkError, SessionState};
use tokio::{net::ToSocketAddrs, sync::mpsc, task::JoinHandle};

/// Tunables for the controller side of the link.
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// Bound on every reply wait. The source protocol blocked forever here;
    /// this implementation surfaces [`LinkError::Timeout`] instead.
    pub reply_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(30),
        }
    }
}

/// Client-role endpoint: sends envelopes, splits the shared inbound stream
/// into replies and alerts, and mirrors the session state locally.
///
/// At most one command is outstanding at a time, so every `Reply` frame
/// answers the envelope most recently sent; `Alert` frames are routed to
/// their own queue and never mistaken for replies.
pub struct ControllerLink {
    channel: Arc<DuplexChannel>,
    replies: mpsc::Receiver<String>,
    alerts: mpsc::Receiver<String>,
    state: SessionState,
    reply_timeout: Duration,
    receiver: JoinHandle<()>,
}

impl ControllerLink {
    /// Connects to a listening console and starts the receive task.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        config: ControllerConfig,
    ) -> Result<Self, LinkError> {
        let channel = Arc::new(DuplexChannel::connect(addr).await?);
        let (reply_tx, replies) = mpsc::channel(16);
        let (alert_tx, alerts) = mpsc::channel(64);
        let receiver = tokio::spawn(receive_loop(Arc::clone(&channel), reply_tx, alert_tx));
        Ok(Self {
            channel,
            replies,
            alerts,
            state: SessionState::AwaitingConnect,
            reply_timeout: config.reply_timeout,
            receiver,
        })
    }

    /// Mirrored view of the session state.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Opens a session; the reply is the console's dashboard text. Alerts
    /// crossing the wait are handed to `on_alert` as they arrive.
    pub async fn open_session(
        &mut self,
        on_alert: impl FnMut(String),
    ) -> Result<String, LinkError> {
        self.state = self.state.accept(EnvelopeKind::Connect)?;
        self.channel
            .send(&Frame::Envelope(Envelope::connect()))
            .await?;
        self.await_reply(on_alert).await
    }

    /// Sends one command and awaits its reply. Alerts crossing the wait are
    /// handed to `on_alert` as they arrive, before the reply is returned.
    pub async fn send_command(
        &mut self,
        line: &str,
        on_alert: impl FnMut(String),
    ) -> Result<String, LinkError> {
        self.state = self.state.accept(EnvelopeKind::Command)?;
        self.channel
            .send(&Frame::Envelope(Envelope::command(line)))
            .await?;
        self.await_reply(on_alert).await
    }

    /// Ends the session. No reply is expected for DISCONNECT.
    pub async fn close_session(&mut self) -> Result<(), LinkError> {
        self.state = self.state.accept(EnvelopeKind::Disconnect)?;
        self.channel
            .send(&Frame::Envelope(Envelope::disconnect()))
            .await
    }

    /// Pops one queued alert without blocking.
    pub fn try_alert(&mut self) -> Option<String> {
        self.alerts.try_recv().ok()
    }

    async fn await_reply(&mut self, mut on_alert: impl FnMut(String)) -> Result<String, LinkError> {
        let deadline = tokio::time::sleep(self.reply_timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                reply = self.replies.recv() => {
                    return reply.ok_or(LinkError::Closed);
                }
                alert = self.alerts.recv() => {
                    match alert {
                        Some(alert) => on_alert(alert),
                        None => return Err(LinkError::Closed),
                    }
                }
                () = &mut deadline => {
                    return Err(LinkError::Timeout(self.reply_timeout));
                }
            }
        }
    }
}

impl Drop for ControllerLink {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

/// Reads frames for the lifetime of the link, routing by wire tag.
async fn receive_loop(
    channel: Arc<DuplexChannel>,
    replies: mpsc::Sender<String>,
    alerts: mpsc::Sender<String>,
) {
    loop {
        match channel.receive().await {
            Ok(Frame::Reply { text }) => {
                if replies.send(text).await.is_err() {
                    return;
                }
            }
            Ok(Frame::Alert { text }) => {
                if alerts.send(text).await.is_err() {
                    return;
                }
            }
            Ok(frame @ Frame::Envelope(_)) => {
                tracing::warn!(?frame, "ignoring envelope frame from console");
            }
            Err(LinkError::Closed) => {
                tracing::info!("console link closed");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "receive failed, stopping link");
                return;
            }
        }
    }
}
