//! Realtime connection to the chat server
//!
//! Payloads are not interpreted; the connection only reports lifecycle
//! events back to the owning agent as [`AgentNotice`]s.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::agent::AgentNotice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketEvent {
    Open,
    Close,
    Message,
    Error,
}

impl SocketEvent {
    pub fn notice_text(&self) -> &'static str {
        match self {
            SocketEvent::Open => "Connected to server",
            SocketEvent::Close => "Lost connection to server",
            SocketEvent::Message => "Message received from server",
            SocketEvent::Error => "Error received from server",
        }
    }
}

/// Handle to a live connection. Clones share the connection; it is torn
/// down by `close` or once every clone is dropped.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    url: String,
    shutdown: mpsc::UnboundedSender<()>,
}

impl SocketHandle {
    pub fn new(url: impl Into<String>, shutdown: mpsc::UnboundedSender<()>) -> Self {
        Self {
            url: url.into(),
            shutdown,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn close(&self) {
        if self.shutdown.send(()).is_ok() {
            debug!(url = %self.url, "Socket close requested");
        }
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.shutdown.is_closed()
    }
}

impl PartialEq for SocketHandle {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.shutdown.same_channel(&other.shutdown)
    }
}

pub trait SocketConnector: Send + Sync {
    /// Open a connection in the background. Lifecycle events for `agent` are
    /// sent on `events`.
    fn connect(
        &self,
        url: &str,
        agent: &str,
        events: mpsc::UnboundedSender<AgentNotice>,
    ) -> SocketHandle;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

impl SocketConnector for TungsteniteConnector {
    fn connect(
        &self,
        url: &str,
        agent: &str,
        events: mpsc::UnboundedSender<AgentNotice>,
    ) -> SocketHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel::<()>();
        let target = url.to_string();
        let agent = agent.to_string();

        let notify = move |event: SocketEvent| {
            let _ = events.send(AgentNotice::new(agent.clone(), event.notice_text()));
        };

        tokio::spawn(async move {
            info!(url = %target, "Connecting websocket");
            let stream = match connect_async(target.as_str()).await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!(url = %target, "Websocket connect failed: {}", e);
                    notify(SocketEvent::Error);
                    notify(SocketEvent::Close);
                    return;
                }
            };

            notify(SocketEvent::Open);
            let (mut write, mut read) = stream.split();

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        let _ = write.send(Message::Close(None)).await;
                        info!(url = %target, "Websocket closed locally");
                        break;
                    }
                    frame = read.next() => match frame {
                        Some(Ok(Message::Close(_))) | None => {
                            notify(SocketEvent::Close);
                            break;
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(_)) => notify(SocketEvent::Message),
                        Some(Err(e)) => {
                            warn!(url = %target, "Websocket error: {}", e);
                            notify(SocketEvent::Error);
                            notify(SocketEvent::Close);
                            break;
                        }
                    }
                }
            }
        });

        SocketHandle::new(url, shutdown_tx)
    }
}
