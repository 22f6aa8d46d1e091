//! Persistent WebSocket transport
//!
//! The game loop is a synchronous macroquad frame callback, so the socket runs
//! on a tokio runtime in the background and talks to the frame loop through
//! two unbounded channels. The frame loop polls [`Transport::poll`] once per
//! frame and never blocks.
//!
//! The connection is created lazily on the first [`Transport::connect`] and
//! then kept alive: after a drop the background task keeps retrying with a
//! fixed delay. Application join state does not survive a reconnect; that is
//! the session manager's business.

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientEvent, ServerEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Connection lifecycle and inbound traffic, as seen by the frame loop
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    ConnectError(String),
    Message(ServerEvent),
}

/// Event-based socket the session manager drives
pub trait Transport {
    fn is_connected(&self) -> bool;

    /// Opens the connection if it is not open or opening already
    fn connect(&mut self);

    /// Fire-and-forget send. Returns false if the event could not be queued.
    fn emit(&mut self, event: ClientEvent) -> bool;

    /// Next pending event, without blocking
    fn poll(&mut self) -> Option<TransportEvent>;
}

pub struct WsTransport {
    runtime: Handle,
    url: String,
    reconnect_delay: Duration,
    connected: Arc<AtomicBool>,
    outbound: Option<mpsc::UnboundedSender<ClientEvent>>,
    inbound: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    task: Option<JoinHandle<()>>,
}

impl WsTransport {
    pub fn new(runtime: Handle, url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            runtime,
            url: url.into(),
            reconnect_delay,
            connected: Arc::new(AtomicBool::new(false)),
            outbound: None,
            inbound: None,
            task: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WsTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect(&mut self) {
        if self.task.is_some() {
            return;
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        self.outbound = Some(out_tx);
        self.inbound = Some(in_rx);

        info!("Connecting to {}", self.url);
        self.task = Some(self.runtime.spawn(connection_loop(
            self.url.clone(),
            self.reconnect_delay,
            self.connected.clone(),
            out_rx,
            in_tx,
        )));
    }

    fn emit(&mut self, event: ClientEvent) -> bool {
        if !self.is_connected() {
            debug!("Not connected, dropping {}", event.name());
            return false;
        }
        match &self.outbound {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.inbound.as_mut()?.try_recv().ok()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Keeps one socket open at a time, reconnecting forever
async fn connection_loop(
    url: String,
    reconnect_delay: Duration,
    connected: Arc<AtomicBool>,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => {
                // Anything queued against the previous socket is stale
                while outbound.try_recv().is_ok() {}

                connected.store(true, Ordering::SeqCst);
                info!("Connected to {}", url);
                if inbound.send(TransportEvent::Connected).is_err() {
                    return;
                }

                run_socket(ws_stream, &mut outbound, &inbound).await;

                connected.store(false, Ordering::SeqCst);
                warn!("Connection to {} lost", url);
                if inbound.send(TransportEvent::Disconnected).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", url, e);
                if inbound.send(TransportEvent::ConnectError(e.to_string())).is_err() {
                    return;
                }
            }
        }

        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn run_socket<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    outbound: &mut mpsc::UnboundedReceiver<ClientEvent>,
    inbound: &mpsc::UnboundedSender<TransportEvent>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            event = outbound.recv() => {
                let Some(event) = event else {
                    let _ = ws_sender.close().await;
                    return;
                };
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(e) = ws_sender.send(Message::Text(text)).await {
                            warn!("Failed to send {}: {}", event.name(), e);
                            return;
                        }
                    }
                    Err(e) => warn!("Failed to encode {}: {}", event.name(), e),
                }
            }
            frame = ws_receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                if inbound.send(TransportEvent::Message(event)).is_err() {
                                    return;
                                }
                            }
                            Err(e) => debug!("Dropping malformed server frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        return;
                    }
                }
            }
        }
    }
}

/// In-memory transport for driving the session and game in tests
#[cfg(test)]
pub(crate) mod testing {
    use super::{Transport, TransportEvent};
    use shared::ClientEvent;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    pub struct MockTransport {
        pub connected: bool,
        pub connect_calls: usize,
        pub sent: Vec<ClientEvent>,
        pub events: VecDeque<TransportEvent>,
    }

    impl MockTransport {
        pub fn connected() -> Self {
            Self {
                connected: true,
                ..Default::default()
            }
        }

        pub fn push(&mut self, event: TransportEvent) {
            self.events.push_back(event);
        }

        pub fn take_sent(&mut self) -> Vec<ClientEvent> {
            std::mem::take(&mut self.sent)
        }
    }

    impl Transport for MockTransport {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn connect(&mut self) {
            self.connect_calls += 1;
        }

        fn emit(&mut self, event: ClientEvent) -> bool {
            if !self.connected {
                return false;
            }
            self.sent.push(event);
            true
        }

        fn poll(&mut self) -> Option<TransportEvent> {
            self.events.pop_front()
        }
    }
}
