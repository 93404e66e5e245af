//! Tokio driver for the connection manager.
//!
//! [`NetClient::connect`] establishes the first TCP connection, then a
//! background task owns the socket: it reads frames, applies the
//! [`ConnectionManager`]'s effects, writes outbound messages, and
//! reconnects with backoff after a drop. The game loop talks to it through
//! channels only — [`NetClient::send`] enqueues outbound messages and
//! [`NetClient::poll`] drains inbound events once per tick, so every
//! handler runs on the game-loop thread and handlers never interleave.

use std::net::SocketAddr;

use arbor_protocol::messages::{ClientMessage, ServerMessage, encode_client};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::connection::{ConnectionManager, ConnectionNotice, JoinConfig, NetEffect};
use crate::framing::{read_frame, write_frame};

/// Inbound event queue depth. Events beyond this are dropped with a
/// warning rather than blocking the reader.
const EVENT_QUEUE_DEPTH: usize = 1024;

/// Outbound message queue depth.
const SEND_QUEUE_DEPTH: usize = 256;

/// Event delivered to the game loop.
#[derive(Debug, PartialEq)]
pub enum NetEvent {
    /// The transport is up and the join request went out.
    Connected,
    /// The transport dropped; a reconnect is scheduled.
    Disconnected,
    /// A connection-level notice (zone fallback).
    Notice(ConnectionNotice),
    /// A decoded server message.
    Message(ServerMessage),
}

/// Handle to the background connection task.
pub struct NetClient {
    outbound_tx: mpsc::Sender<ClientMessage>,
    events_rx: mpsc::Receiver<NetEvent>,
    shutdown_tx: watch::Sender<bool>,
    connected_rx: watch::Receiver<bool>,
}

impl NetClient {
    /// Connects to the server and spawns the driver task.
    ///
    /// The first TCP connect is awaited so configuration errors surface
    /// immediately; later drops are handled by the driver's backoff loop.
    pub async fn connect(addr: SocketAddr, join: JoinConfig) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let (outbound_tx, outbound_rx) = mpsc::channel(SEND_QUEUE_DEPTH);
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (connected_tx, connected_rx) = watch::channel(false);

        let driver = Driver {
            addr,
            manager: ConnectionManager::new(join),
            outbound_rx,
            events_tx,
            shutdown_rx,
            connected_tx,
        };
        tokio::spawn(driver.run(stream));

        Ok(Self {
            outbound_tx,
            events_rx,
            shutdown_tx,
            connected_rx,
        })
    }

    /// True while the transport is up.
    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Enqueues an outbound message. Dropped with a warning if the queue
    /// is full or the driver has exited.
    pub fn send(&self, msg: ClientMessage) {
        if let Err(e) = self.outbound_tx.try_send(msg) {
            warn!("dropping outbound message: {e}");
        }
    }

    /// Drains all pending events without blocking. Called once per tick
    /// from the game loop.
    pub fn poll(&mut self) -> Vec<NetEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Intentional shutdown. The driver detaches the manager before the
    /// socket closes, so no reconnect can be scheduled afterwards.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

struct Driver {
    addr: SocketAddr,
    manager: ConnectionManager,
    outbound_rx: mpsc::Receiver<ClientMessage>,
    events_tx: mpsc::Sender<NetEvent>,
    shutdown_rx: watch::Receiver<bool>,
    connected_tx: watch::Sender<bool>,
}

impl Driver {
    async fn run(mut self, first: TcpStream) {
        let mut stream = Some(first);
        loop {
            let Some(current) = stream.take() else {
                return;
            };
            self.run_session(current).await;
            let _ = self.connected_tx.send(false);

            let effects = self.manager.on_closed();
            if effects.is_empty() {
                // Detached shutdown path.
                return;
            }
            let mut delay = None;
            for effect in effects {
                match effect {
                    NetEffect::TransportLost => {
                        self.emit(NetEvent::Disconnected);
                    }
                    NetEffect::ReconnectAfter(d) => delay = Some(d),
                    other => debug!(?other, "unexpected close effect"),
                }
            }
            let Some(mut delay) = delay else {
                return;
            };

            // Backoff loop until the server is reachable again or the
            // application shuts down.
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.shutdown_rx.changed() => {
                        if *self.shutdown_rx.borrow() {
                            self.manager.detach();
                            return;
                        }
                    }
                }
                match TcpStream::connect(self.addr).await {
                    Ok(s) => {
                        if s.set_nodelay(true).is_err() {
                            delay = self.manager.on_reconnect_failed();
                            continue;
                        }
                        stream = Some(s);
                        break;
                    }
                    Err(e) => {
                        delay = self.manager.on_reconnect_failed();
                        warn!(?delay, "reconnect failed: {e}");
                    }
                }
            }
        }
    }

    /// Runs one connected session until the socket drops or shutdown is
    /// requested. On shutdown the manager is detached BEFORE the halves
    /// are dropped, closing the race where the close event schedules a
    /// stray reconnect.
    ///
    /// Frame reading runs in its own task: `read_frame` performs multiple
    /// reads per frame and must never be cancelled mid-frame, or the
    /// stream desynchronizes. The select below only touches channel
    /// operations, which are cancel-safe.
    async fn run_session(&mut self, stream: TcpStream) {
        let (mut reader, mut writer) = stream.into_split();

        let (frames_tx, mut frames_rx) = mpsc::channel::<Vec<u8>>(EVENT_QUEUE_DEPTH);
        let reader_task = tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(payload) => {
                        if frames_tx.send(payload).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        debug!("read side closed: {e}");
                        return;
                    }
                }
            }
        });

        let effects = self.manager.on_connected();
        let _ = self.connected_tx.send(true);
        self.emit(NetEvent::Connected);
        if self.apply(effects, &mut writer).await {
            loop {
                tokio::select! {
                    frame = frames_rx.recv() => {
                        match frame {
                            Some(payload) => {
                                let effects = self.manager.on_frame(&payload);
                                if !self.apply(effects, &mut writer).await {
                                    break;
                                }
                            }
                            // Reader task exited: socket closed or errored.
                            None => break,
                        }
                    }
                    msg = self.outbound_rx.recv() => {
                        match msg {
                            Some(msg) => {
                                if !self.write_message(&msg, &mut writer).await {
                                    break;
                                }
                            }
                            // All handles dropped: treat as shutdown.
                            None => {
                                self.manager.detach();
                                break;
                            }
                        }
                    }
                    _ = self.shutdown_rx.changed() => {
                        if *self.shutdown_rx.borrow() {
                            self.manager.detach();
                            break;
                        }
                    }
                }
            }
        }
        reader_task.abort();
    }

    /// Applies manager effects. Returns `false` when the session must end
    /// (write failure).
    async fn apply(&mut self, effects: Vec<NetEffect>, writer: &mut OwnedWriteHalf) -> bool {
        for effect in effects {
            match effect {
                NetEffect::Send(msg) => {
                    if !self.write_message(&msg, writer).await {
                        return false;
                    }
                }
                NetEffect::Deliver(msg) => self.emit(NetEvent::Message(msg)),
                NetEffect::Notice(notice) => self.emit(NetEvent::Notice(notice)),
                NetEffect::TransportLost => self.emit(NetEvent::Disconnected),
                NetEffect::ReconnectAfter(_) => {
                    debug!("reconnect effect outside close path; ignored");
                }
            }
        }
        true
    }

    async fn write_message(&self, msg: &ClientMessage, writer: &mut OwnedWriteHalf) -> bool {
        let payload = match encode_client(msg) {
            Ok(p) => p,
            Err(e) => {
                warn!("failed to encode outbound message: {e}");
                return true;
            }
        };
        match write_frame(writer, &payload).await {
            Ok(()) => true,
            Err(e) => {
                debug!("write side closed: {e}");
                false
            }
        }
    }

    fn emit(&self, event: NetEvent) {
        if self.events_tx.try_send(event).is_err() {
            warn!("event queue full; dropping inbound event");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_protocol::messages::{Joined, decode_client};
    use arbor_protocol::{ParticipantId, ZoneId};
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn join_config() -> JoinConfig {
        JoinConfig {
            zone: None,
            name: "Tester".to_string(),
            shirt_color: None,
            user_id: None,
        }
    }

    /// Server that accepts one connection, expects a join frame, and
    /// answers with a Joined ack.
    async fn join_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.into_split();

            let payload = read_frame(&mut reader).await.unwrap();
            let msg = decode_client(&payload).unwrap();
            assert!(matches!(msg, ClientMessage::JoinZone(_)));

            let ack = arbor_protocol::encode_server(&ServerMessage::Joined(Joined {
                room_id: "room-1".to_string(),
                zone: ZoneId::default_zone(),
                self_id: ParticipantId::new("me"),
                can_edit: true,
                player_states: vec![],
                time_ms: 0.0,
            }))
            .unwrap();
            write_frame(&mut writer, &ack).await.unwrap();

            // Keep the connection open so the test controls its lifetime.
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        addr
    }

    async fn poll_until<F: Fn(&NetEvent) -> bool>(
        client: &mut NetClient,
        pred: F,
    ) -> Option<NetEvent> {
        for _ in 0..100 {
            for event in client.poll() {
                if pred(&event) {
                    return Some(event);
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_connect_joins_and_delivers_ack() {
        let addr = join_server().await;
        let mut client = NetClient::connect(addr, join_config()).await.unwrap();

        let mut events = Vec::new();
        for _ in 0..100 {
            events.extend(client.poll());
            if events
                .iter()
                .any(|e| matches!(e, NetEvent::Message(ServerMessage::Joined(_))))
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(
            events.iter().any(|e| matches!(e, NetEvent::Connected)),
            "missing Connected event: {events:?}"
        );
        assert!(
            events
                .iter()
                .any(|e| matches!(e, NetEvent::Message(ServerMessage::Joined(_)))),
            "missing Joined delivery: {events:?}"
        );
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_outbound_messages_reach_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut reader, _writer) = stream.into_split();
            // First frame is the join, second the chat.
            let _join = read_frame(&mut reader).await.unwrap();
            let payload = read_frame(&mut reader).await.unwrap();
            decode_client(&payload).unwrap()
        });

        let client = NetClient::connect(addr, join_config()).await.unwrap();
        client.send(ClientMessage::Chat(arbor_protocol::messages::Chat {
            name: "Tester".to_string(),
            text: "hello".to_string(),
        }));

        let received = server.await.unwrap();
        assert!(matches!(received, ClientMessage::Chat(c) if c.text == "hello"));
    }

    #[tokio::test]
    async fn test_split_inbound_frame_survives_concurrent_outbound() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.into_split();
            let _join = read_frame(&mut reader).await.unwrap();

            let payload = arbor_protocol::encode_server(&ServerMessage::GameReset).unwrap();
            let mut frame = (payload.len() as u32).to_le_bytes().to_vec();
            frame.extend_from_slice(&payload);
            let split = frame.len() / 2;

            // Deliver the frame in two segments with the client's outbound
            // traffic arriving in between, so the tail is still in flight
            // while the client writes.
            writer.write_all(&frame[..split]).await.unwrap();
            writer.flush().await.unwrap();
            let chat = read_frame(&mut reader).await.unwrap();
            writer.write_all(&frame[split..]).await.unwrap();
            writer.flush().await.unwrap();

            // Keep the socket open while the client drains.
            tokio::time::sleep(Duration::from_millis(500)).await;
            decode_client(&chat).unwrap()
        });

        let mut client = NetClient::connect(addr, join_config()).await.unwrap();
        poll_until(&mut client, |e| matches!(e, NetEvent::Connected)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.send(ClientMessage::Chat(arbor_protocol::messages::Chat {
            name: "Tester".to_string(),
            text: "mid-frame".to_string(),
        }));

        let delivered = poll_until(&mut client, |e| {
            matches!(e, NetEvent::Message(ServerMessage::GameReset))
        })
        .await;
        assert!(delivered.is_some(), "split frame must be reassembled intact");

        let received = server.await.unwrap();
        assert!(matches!(received, ClientMessage::Chat(c) if c.text == "mid-frame"));
        assert!(
            client.is_connected(),
            "a split frame must not tear down a healthy session"
        );
    }

    #[tokio::test]
    async fn test_shutdown_does_not_reconnect() {
        let addr = join_server().await;
        let mut client = NetClient::connect(addr, join_config()).await.unwrap();
        poll_until(&mut client, |e| matches!(e, NetEvent::Connected)).await;

        client.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!client.is_connected());

        // No Disconnected (reconnect-scheduled) event after an intentional
        // shutdown.
        let disconnected =
            poll_until(&mut client, |e| matches!(e, NetEvent::Disconnected)).await;
        assert!(disconnected.is_none(), "shutdown must not schedule reconnect");
    }

    #[tokio::test]
    async fn test_server_drop_emits_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            // Accept, then drop immediately.
            drop(stream);
        });

        let mut client = NetClient::connect(addr, join_config()).await.unwrap();
        let disconnected =
            poll_until(&mut client, |e| matches!(e, NetEvent::Disconnected)).await;
        assert!(disconnected.is_some(), "expected Disconnected after server drop");
    }
}
