use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use tripmate_core::{CoreError, CoreResult};
use tripmate_shared::{ChatMessage, OutgoingMessage, TypingNotice};

use crate::driver;
use crate::frame::Frame;
use crate::transport::{self, TransportConfig};

pub(crate) const SEND_DESTINATION: &str = "/app/chat.sendMessage";
pub(crate) const PRESENCE_DESTINATION: &str = "/app/chat.addUser";

pub(crate) fn room_topic(room_id: i64) -> String {
    format!("/topic/chat/{}", room_id)
}

fn typing_destination(room_id: i64) -> String {
    format!("/app/chat.typing/{}", room_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Established,
    AlreadyConnected,
    /// Another connect is in flight; this call did nothing.
    InProgress,
}

/// Lifecycle notifications published by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected { reason: String },
    Reconnecting { attempt: u32 },
    Reconnected,
    BrokerError { message: String },
}

/// Live messages of one room. Clones share the same channel, so each
/// inbound message is handed out exactly once across all clones.
#[derive(Clone)]
pub struct RoomSubscription {
    room_id: i64,
    id: String,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<ChatMessage>>>,
}

impl RoomSubscription {
    pub fn room_id(&self) -> i64 {
        self.room_id
    }

    /// STOMP subscription id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next message in arrival order; `None` once the room is unsubscribed.
    pub async fn next_message(&self) -> Option<ChatMessage> {
        self.rx.lock().await.recv().await
    }

    pub fn same_channel(&self, other: &RoomSubscription) -> bool {
        Arc::ptr_eq(&self.rx, &other.rx)
    }
}

impl std::fmt::Debug for RoomSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSubscription")
            .field("room_id", &self.room_id)
            .field("id", &self.id)
            .finish()
    }
}

pub(crate) struct RoomEntry {
    pub id: String,
    pub tx: mpsc::UnboundedSender<ChatMessage>,
    handle: RoomSubscription,
    /// Live `RoomGuard`s sharing this subscription.
    guards: usize,
}

pub(crate) struct State {
    pub connection: ConnectionState,
    pub outbound: Option<mpsc::UnboundedSender<Frame>>,
    pub rooms: HashMap<i64, RoomEntry>,
    shutdown: Option<oneshot::Sender<()>>,
}

pub(crate) struct Inner {
    pub config: TransportConfig,
    state: Mutex<State>,
    events: broadcast::Sender<SessionEvent>,
    next_subscription: AtomicU64,
}

impl Inner {
    pub fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Hands a MESSAGE frame body to the room it was addressed to.
    pub fn dispatch(&self, frame: &Frame) {
        let state = self.lock();
        // The destination is only consulted when the broker omits the subscription id.
        let entry = match frame.get("subscription") {
            Some(sub) => state.rooms.values().find(|entry| entry.id == sub),
            None => frame
                .get("destination")
                .and_then(|d| d.strip_prefix("/topic/chat/"))
                .and_then(|id| id.parse().ok())
                .and_then(|room_id| state.rooms.get(&room_id)),
        };
        let Some(entry) = entry else {
            debug!("Dropping message for unknown subscription {:?}", frame.get("subscription"));
            return;
        };

        match serde_json::from_str::<ChatMessage>(&frame.body) {
            Ok(message) => {
                let _ = entry.tx.send(message);
            }
            Err(e) => warn!(
                "Dropping malformed message on {}: {}",
                frame.get("destination").unwrap_or("?"),
                e
            ),
        }
    }

    /// SUBSCRIBE frames for every live room, re-sent after a reconnect.
    /// `None` when the session was disconnected meanwhile.
    pub fn resubscriptions(&self) -> Option<Vec<Frame>> {
        let state = self.lock();
        if state.connection != ConnectionState::Connecting {
            return None;
        }
        Some(
            state
                .rooms
                .iter()
                .map(|(room_id, entry)| Frame::subscribe(&entry.id, &room_topic(*room_id)))
                .collect(),
        )
    }

    pub fn set_connection(&self, connection: ConnectionState) {
        self.lock().connection = connection;
    }

    /// Final teardown when the driver gives up on the connection.
    pub fn abandon(&self) {
        let mut state = self.lock();
        state.connection = ConnectionState::Disconnected;
        state.outbound = None;
        state.shutdown = None;
        state.rooms.clear();
    }
}

fn remove_room(state: &mut State, room_id: i64) {
    let Some(entry) = state.rooms.remove(&room_id) else {
        return;
    };
    if state.connection == ConnectionState::Connected {
        if let Some(outbound) = &state.outbound {
            let _ = outbound.send(Frame::unsubscribe(&entry.id));
        }
    }
    info!("Unsubscribed from chat room {}", room_id);
}

/// Realtime chat over STOMP. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

impl ChatSession {
    pub fn new(config: TransportConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State {
                    connection: ConnectionState::Disconnected,
                    outbound: None,
                    rooms: HashMap::new(),
                    shutdown: None,
                }),
                events,
                next_subscription: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().connection
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn event_stream(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.events())
    }

    pub async fn connect(&self) -> CoreResult<ConnectOutcome> {
        {
            let mut state = self.inner.lock();
            match state.connection {
                ConnectionState::Connected => return Ok(ConnectOutcome::AlreadyConnected),
                ConnectionState::Connecting => {
                    debug!("Connect already in progress");
                    return Ok(ConnectOutcome::InProgress);
                }
                ConnectionState::Disconnected => state.connection = ConnectionState::Connecting,
            }
        }

        let link = match transport::open(&self.inner.config).await {
            Ok(link) => link,
            Err(e) => {
                self.inner.set_connection(ConnectionState::Disconnected);
                warn!("Chat connect to {} failed: {}", self.inner.config.ws_url, e);
                return Err(e);
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let cancelled = {
            let mut state = self.inner.lock();
            if state.connection == ConnectionState::Connecting {
                state.connection = ConnectionState::Connected;
                state.outbound = Some(outbound_tx);
                state.shutdown = Some(shutdown_tx);
                false
            } else {
                true
            }
        };
        if cancelled {
            link.close().await;
            return Err(CoreError::Transport("disconnected while connecting".to_string()));
        }

        tokio::spawn(driver::run(
            Arc::downgrade(&self.inner),
            link,
            outbound_rx,
            shutdown_rx,
        ));
        info!("Chat connected to {}", self.inner.config.ws_url);
        self.inner.emit(SessionEvent::Connected);
        Ok(ConnectOutcome::Established)
    }

    /// Starts delivering `/topic/chat/{room_id}`. Subscribing twice returns the same handle.
    pub fn subscribe_room(&self, room_id: i64) -> CoreResult<RoomSubscription> {
        self.subscribe(room_id, false)
    }

    fn subscribe(&self, room_id: i64, guarded: bool) -> CoreResult<RoomSubscription> {
        let mut state = self.inner.lock();
        if state.connection != ConnectionState::Connected {
            return Err(CoreError::NotConnected);
        }
        if let Some(entry) = state.rooms.get_mut(&room_id) {
            debug!("Room {} already subscribed as {}", room_id, entry.id);
            if guarded {
                entry.guards += 1;
            }
            return Ok(entry.handle.clone());
        }

        let id = format!(
            "sub-{}",
            self.inner.next_subscription.fetch_add(1, Ordering::SeqCst)
        );
        let outbound = state.outbound.as_ref().ok_or(CoreError::NotConnected)?;
        outbound
            .send(Frame::subscribe(&id, &room_topic(room_id)))
            .map_err(|_| CoreError::NotConnected)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = RoomSubscription {
            room_id,
            id: id.clone(),
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        };
        state.rooms.insert(
            room_id,
            RoomEntry {
                id,
                tx,
                handle: handle.clone(),
                guards: usize::from(guarded),
            },
        );
        info!("Subscribed to chat room {}", room_id);
        Ok(handle)
    }

    /// Subscription released again when the last guard on the room drops.
    pub fn join_room(&self, room_id: i64) -> CoreResult<RoomGuard> {
        let subscription = self.subscribe(room_id, true)?;
        Ok(RoomGuard {
            session: self.clone(),
            subscription,
        })
    }

    /// Closes the room's channel. No-op when the room is not subscribed.
    pub fn unsubscribe_room(&self, room_id: i64) {
        remove_room(&mut self.inner.lock(), room_id);
    }

    /// Drops one guard's claim on a subscription, unsubscribing with the last one.
    fn release_guard(&self, subscription: &RoomSubscription) {
        let mut state = self.inner.lock();
        let Some(entry) = state.rooms.get_mut(&subscription.room_id) else {
            return;
        };
        // Replaced by a newer subscription meanwhile.
        if entry.id != subscription.id {
            return;
        }
        entry.guards = entry.guards.saturating_sub(1);
        if entry.guards > 0 {
            debug!("Room {} still held by {} guard(s)", subscription.room_id, entry.guards);
            return;
        }
        remove_room(&mut state, subscription.room_id);
    }

    pub fn send_message(&self, message: &OutgoingMessage) -> CoreResult<()> {
        self.publish(SEND_DESTINATION, message)
    }

    /// Announces `display_name` in the room as a SYSTEM message.
    pub fn announce_presence(&self, room_id: i64, display_name: &str) -> CoreResult<()> {
        let notice = OutgoingMessage::system(room_id, format!("{} joined the chat.", display_name));
        self.publish(PRESENCE_DESTINATION, &notice)
    }

    pub fn notify_typing(&self, room_id: i64, display_name: &str) -> CoreResult<()> {
        let notice = TypingNotice {
            user_name: display_name.to_string(),
        };
        self.publish(&typing_destination(room_id), &notice)
    }

    fn publish<T: Serialize + ?Sized>(&self, destination: &str, body: &T) -> CoreResult<()> {
        let state = self.inner.lock();
        if state.connection != ConnectionState::Connected {
            return Err(CoreError::NotConnected);
        }
        let outbound = state.outbound.as_ref().ok_or(CoreError::NotConnected)?;
        let frame = Frame::send(destination).json_body(body)?;
        outbound.send(frame).map_err(|_| CoreError::NotConnected)
    }

    /// Unsubscribes every room and closes the connection. No-op when disconnected.
    pub fn disconnect(&self) {
        let shutdown = {
            let mut state = self.inner.lock();
            if state.connection == ConnectionState::Disconnected {
                return;
            }
            let rooms: Vec<(i64, RoomEntry)> = state.rooms.drain().collect();
            if let Some(outbound) = state.outbound.take() {
                for (_, entry) in &rooms {
                    let _ = outbound.send(Frame::unsubscribe(&entry.id));
                }
                let _ = outbound.send(Frame::disconnect());
            }
            state.connection = ConnectionState::Disconnected;
            state.shutdown.take()
        };

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        info!("Chat disconnected");
        self.inner.emit(SessionEvent::Disconnected {
            reason: "closed by client".to_string(),
        });
    }
}

/// A room subscription released on drop
pub struct RoomGuard {
    session: ChatSession,
    subscription: RoomSubscription,
}

impl RoomGuard {
    pub fn subscription(&self) -> &RoomSubscription {
        &self.subscription
    }

    pub fn room_id(&self) -> i64 {
        self.subscription.room_id
    }

    pub async fn next_message(&self) -> Option<ChatMessage> {
        self.subscription.next_message().await
    }
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        self.session.release_guard(&self.subscription);
    }
}
