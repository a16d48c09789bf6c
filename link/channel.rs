//! Point-to-point duplex channel carrying newline-delimited JSON frames.

use std::net::SocketAddr;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream, ToSocketAddrs,
    },
    sync::Mutex,
};

use crate::protocol::{Frame, LinkError};

/// Server-role endpoint: the console binds and waits for one controller.
#[derive(Debug)]
pub struct LinkListener {
    inner: TcpListener,
}

impl LinkListener {
    /// Binds the listening socket.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, LinkError> {
        Ok(Self {
            inner: TcpListener::bind(addr).await?,
        })
    }

    /// Returns the bound address (port 0 resolves here).
    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.inner.local_addr()?)
    }

    /// Accepts exactly one peer and wraps it as a channel.
    pub async fn accept(&self) -> Result<DuplexChannel, LinkError> {
        let (stream, peer) = self.inner.accept().await?;
        tracing::info!(%peer, "controller link accepted");
        Ok(DuplexChannel::from_stream(stream, peer))
    }
}

/// Ordered, reliable frame channel between exactly two endpoints.
///
/// Frames are atomic: the writer lock is held for a whole line, so the
/// session task and the alert forwarder interleave frames, never bytes.
#[derive(Debug)]
pub struct DuplexChannel {
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    peer: SocketAddr,
}

impl DuplexChannel {
    /// Connects to a listening console as the client role.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        tracing::info!(%peer, "console link established");
        Ok(Self::from_stream(stream, peer))
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
            peer,
        }
    }

    /// Address of the remote endpoint.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Sends one frame, preserving send order.
    pub async fn send(&self, frame: &Frame) -> Result<(), LinkError> {
        let mut line = serde_json::to_string(frame)?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Awaits the next frame; [`LinkError::Closed`] once the peer hangs up.
    pub async fn receive(&self) -> Result<Frame, LinkError> {
        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(LinkError::Closed);
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Envelope;

    #[tokio::test]
    async fn frames_round_trip_in_order() {
        let listener = LinkListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let channel = DuplexChannel::connect(addr).await.unwrap();
            channel
                .send(&Frame::Envelope(Envelope::connect()))
                .await
                .unwrap();
            channel
                .send(&Frame::Envelope(Envelope::command("get_alarms")))
                .await
                .unwrap();
            channel.receive().await.unwrap()
        });

        let server = listener.accept().await.unwrap();
        assert_eq!(
            server.receive().await.unwrap(),
            Frame::Envelope(Envelope::connect())
        );
        assert_eq!(
            server.receive().await.unwrap(),
            Frame::Envelope(Envelope::command("get_alarms"))
        );
        server
            .send(&Frame::Reply {
                text: "No alarms set".into(),
            })
            .await
            .unwrap();

        let reply = client.await.unwrap();
        assert_eq!(
            reply,
            Frame::Reply {
                text: "No alarms set".into()
            }
        );
    }

    #[tokio::test]
    async fn peer_hangup_surfaces_closed() {
        let listener = LinkListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = DuplexChannel::connect(addr).await.unwrap();
        let server = listener.accept().await.unwrap();
        drop(client);

        match server.receive().await {
            Err(LinkError::Closed) => {}
            other => panic!("expected Closed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn alert_and_reply_share_the_stream_unambiguously() {
        let listener = LinkListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = DuplexChannel::connect(addr).await.unwrap();
        let server = listener.accept().await.unwrap();

        server
            .send(&Frame::Alert {
                text: "alarm fired".into(),
            })
            .await
            .unwrap();
        server
            .send(&Frame::Reply {
                text: "done".into(),
            })
            .await
            .unwrap();

        assert!(matches!(
            client.receive().await.unwrap(),
            Frame::Alert { .. }
        ));
        assert!(matches!(
            client.receive().await.unwrap(),
            Frame::Reply { .. }
        ));
    }
}
