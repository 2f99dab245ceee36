use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::{SyncError, SyncResult};
use crate::messages::{ClientFrame, ServerFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Connected,
    /// Closed from this side.
    Closed,
    /// Dropped by the server or by a transport error.
    ReconnectNeeded,
}

#[derive(Debug)]
pub enum ChannelEvent {
    State(ChannelState),
    Frame(ServerFrame),
}

/// A channel event tagged with the room session it was opened for.
#[derive(Debug)]
pub struct LiveEvent {
    pub generation: u64,
    pub event: ChannelEvent,
}

/// Socket for one room session. Never reconnects on its own.
pub struct LiveChannel {
    outbound: mpsc::UnboundedSender<ClientFrame>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl LiveChannel {
    pub fn open(url: String, generation: u64, events: mpsc::UnboundedSender<LiveEvent>) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let pump = Pump { generation, events };
            pump.run(url, outbound_rx, shutdown_rx).await;
        });

        LiveChannel {
            outbound,
            shutdown: Some(shutdown),
        }
    }

    pub fn send(&self, frame: ClientFrame) -> SyncResult<()> {
        self.outbound.send(frame).map_err(|_| SyncError::ClientClosed)
    }

    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.close();
    }
}

struct Pump {
    generation: u64,
    events: mpsc::UnboundedSender<LiveEvent>,
}

impl Pump {
    fn emit(&self, event: ChannelEvent) {
        let _ = self.events.send(LiveEvent {
            generation: self.generation,
            event,
        });
    }

    async fn run(
        self,
        url: String,
        mut outbound: mpsc::UnboundedReceiver<ClientFrame>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        self.emit(ChannelEvent::State(ChannelState::Connecting));
        info!("Opening live channel for session {}", self.generation);

        let mut close_requested = false;
        let handshake = connect_async(url.as_str());
        tokio::pin!(handshake);
        let result = loop {
            tokio::select! {
                result = &mut handshake => break result,
                _ = &mut shutdown, if !close_requested => close_requested = true,
            }
        };

        let mut ws = match result {
            Ok((ws, _)) => ws,
            Err(e) => {
                let err = SyncError::from(e);
                error!("Live channel connection failed: {}", err);
                self.emit(ChannelEvent::State(ChannelState::ReconnectNeeded));
                return;
            }
        };

        if close_requested {
            info!("Session {} ended while connecting, closing socket", self.generation);
            if let Err(e) = ws.close(None).await {
                debug!("Close after handshake failed: {}", e);
            }
            self.emit(ChannelEvent::State(ChannelState::Closed));
            return;
        }

        info!("Live channel connected for session {}", self.generation);
        self.emit(ChannelEvent::State(ChannelState::Connected));

        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!("Failed to send close frame: {}", e);
                    }
                    info!("Live channel closed for session {}", self.generation);
                    self.emit(ChannelEvent::State(ChannelState::Closed));
                    return;
                }
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        // owner gone without an explicit close
                        let _ = sink.send(Message::Close(None)).await;
                        return;
                    };
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to encode outbound frame: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::text(text)).await {
                        error!("Failed to send live frame: {}", e);
                        self.emit(ChannelEvent::State(ChannelState::ReconnectNeeded));
                        return;
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        info!("Server closed live channel: {:?}", frame);
                        self.emit(ChannelEvent::State(ChannelState::ReconnectNeeded));
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Live channel error: {}", e);
                        self.emit(ChannelEvent::State(ChannelState::ReconnectNeeded));
                        return;
                    }
                    None => {
                        warn!("Live channel stream ended");
                        self.emit(ChannelEvent::State(ChannelState::ReconnectNeeded));
                        return;
                    }
                },
            }
        }
    }

    fn dispatch(&self, text: &str) {
        debug!("Live frame: {}", text);
        match serde_json::from_str::<ServerFrame>(text) {
            Ok(ServerFrame::Unknown) => debug!("Ignoring live frame of unknown type"),
            Ok(frame) => self.emit(ChannelEvent::Frame(frame)),
            Err(e) => error!("Failed to parse incoming frame: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::sync::Notify;
    use tokio::time::{sleep, timeout};
    use tokio_tungstenite::accept_async;

    use super::*;

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/chat/1/", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<LiveEvent>) -> Option<ChannelEvent> {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for channel event")
            .map(|live| {
                assert_eq!(live.generation, 3);
                live.event
            })
    }

    fn state(event: Option<ChannelEvent>) -> ChannelState {
        match event {
            Some(ChannelEvent::State(state)) => state,
            other => panic!("expected a state change, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_during_handshake_closes_once_connected() {
        let (listener, url) = listen().await;
        let release = Arc::new(Notify::new());
        let (seen_tx, seen_rx) = oneshot::channel();

        let gate = Arc::clone(&release);
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            gate.notified().await;
            let mut ws = accept_async(tcp).await.unwrap();
            let _ = seen_tx.send(ws.next().await);
        });

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut channel = LiveChannel::open(url, 3, events_tx);
        assert_eq!(state(next_event(&mut events).await), ChannelState::Connecting);

        channel.close();
        sleep(Duration::from_millis(50)).await;
        release.notify_one();

        assert_eq!(state(next_event(&mut events).await), ChannelState::Closed);
        assert!(next_event(&mut events).await.is_none());

        let seen = timeout(Duration::from_secs(5), seen_rx).await.unwrap().unwrap();
        assert!(matches!(seen, Some(Ok(Message::Close(_)))), "server saw {seen:?}");
    }

    #[tokio::test]
    async fn server_close_needs_reconnect_after_skipping_bad_frames() {
        let (listener, url) = listen().await;
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            for text in [
                "{not json",
                r#"{"type":"read_receipt","message_id":4}"#,
                r#"{"type":"typing","username":"alice"}"#,
            ] {
                ws.send(Message::text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
            while ws.next().await.is_some() {}
        });

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let _channel = LiveChannel::open(url, 3, events_tx);

        assert_eq!(state(next_event(&mut events).await), ChannelState::Connecting);
        assert_eq!(state(next_event(&mut events).await), ChannelState::Connected);
        match next_event(&mut events).await {
            Some(ChannelEvent::Frame(ServerFrame::Typing { username })) => {
                assert_eq!(username, "alice");
            }
            other => panic!("expected the typing frame, got {other:?}"),
        }
        assert_eq!(state(next_event(&mut events).await), ChannelState::ReconnectNeeded);
        assert!(next_event(&mut events).await.is_none());
    }

    #[tokio::test]
    async fn queued_frames_reach_the_server() {
        let (listener, url) = listen().await;
        let (seen_tx, seen_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
        });

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let channel = LiveChannel::open(url, 3, events_tx);
        assert_eq!(state(next_event(&mut events).await), ChannelState::Connecting);
        assert_eq!(state(next_event(&mut events).await), ChannelState::Connected);

        channel
            .send(ClientFrame::StopTyping {
                username: "bob".to_string(),
            })
            .unwrap();
        let text = timeout(Duration::from_secs(5), seen_rx).await.unwrap().unwrap();
        assert_eq!(text, r#"{"type":"stop_typing","username":"bob"}"#);
    }
}
