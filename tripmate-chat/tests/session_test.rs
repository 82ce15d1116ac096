//! ChatSession against an in-process STOMP broker.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use tripmate_chat::frame::{decode, Inbound};
use tripmate_chat::{
    ChatSession, Command, ConnectOutcome, ConnectionState, Frame, RoomFeed, SessionEvent,
    TransportConfig,
};
use tripmate_core::{ChatRepository, CoreError, CoreResult, StaticIdentity};
use tripmate_shared::{ChatMessage, ChatRoom, OutgoingMessage, Page};

const DROP_CONNECTION: &str = "__drop__";
const WAIT: Duration = Duration::from_secs(3);

struct Broker {
    addr: SocketAddr,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    push: mpsc::UnboundedSender<String>,
}

impl Broker {
    async fn start(server_heartbeat: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind to random port");
        let addr = listener.local_addr().expect("get local addr");
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (push, push_rx) = mpsc::unbounded_channel::<String>();
        let push_rx = Arc::new(Mutex::new(push_rx));

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                serve(stream, server_heartbeat, inbound_tx.clone(), push_rx.clone()).await;
            }
        });
        Self { addr, inbound, push }
    }

    fn config(&self) -> TransportConfig {
        let mut config = TransportConfig::new(format!("ws://{}/ws/chat/websocket", self.addr));
        config.connect_timeout = Duration::from_secs(2);
        config.reconnect_delay = Duration::ZERO;
        config
    }

    /// Next frame from the client, skipping heart-beats.
    async fn frame(&mut self) -> Frame {
        loop {
            match timeout(WAIT, self.inbound.recv()).await {
                Ok(Some(Inbound::Frame(frame))) => return frame,
                Ok(Some(Inbound::Heartbeat)) => continue,
                other => panic!("broker saw no frame: {:?}", other),
            }
        }
    }

    async fn expect(&mut self, command: Command) -> Frame {
        let frame = self.frame().await;
        assert_eq!(frame.command, command, "unexpected frame {:?}", frame);
        frame
    }

    fn deliver(&self, subscription: &str, room_id: i64, body: &str) {
        let frame = Frame::new(Command::Message)
            .header("destination", format!("/topic/chat/{}", room_id))
            .header("subscription", subscription)
            .header("message-id", "m-1");
        let frame = Frame {
            body: body.to_string(),
            ..frame
        };
        self.push.send(frame.encode()).unwrap();
    }
}

async fn serve(
    stream: TcpStream,
    server_heartbeat: &str,
    inbound: mpsc::UnboundedSender<Inbound>,
    pushes: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
) {
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();
    let mut pushes = pushes.lock().await;
    loop {
        tokio::select! {
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let Ok(decoded) = decode(&text) else { continue };
                    if let Inbound::Frame(frame) = &decoded {
                        if frame.command == Command::Connect {
                            let connected = format!(
                                "CONNECTED\nversion:1.2\nheart-beat:{}\n\n\0",
                                server_heartbeat
                            );
                            if sink.send(Message::Text(connected)).await.is_err() {
                                return;
                            }
                        }
                    }
                    let _ = inbound.send(decoded);
                }
                Some(Ok(_)) => {}
                _ => return,
            },
            push = pushes.recv() => match push {
                Some(text) if text == DROP_CONNECTION => return,
                Some(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                None => return,
            },
        }
    }
}

fn message_json(id: i64, room_id: i64, content: &str) -> String {
    json!({
        "id": id,
        "chatRoomId": room_id,
        "senderId": 7,
        "senderNickname": "jun",
        "messageType": "TEXT",
        "content": content,
        "createdAt": format!("2025-05-01T10:00:{:02}", id % 60)
    })
    .to_string()
}

async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("event in time")
        .expect("event channel open")
}

async fn connected(broker: &mut Broker, config: TransportConfig) -> ChatSession {
    let session = ChatSession::new(config);
    assert_eq!(session.connect().await.unwrap(), ConnectOutcome::Established);
    broker.expect(Command::Connect).await;
    session
}

#[tokio::test]
async fn test_connect_handshake_and_repeat() {
    let mut broker = Broker::start("0,0").await;
    let session = ChatSession::new(broker.config());

    assert_eq!(session.connect().await.unwrap(), ConnectOutcome::Established);
    let connect = broker.expect(Command::Connect).await;
    assert_eq!(connect.get("accept-version"), Some("1.2"));
    assert_eq!(connect.get("host"), Some("127.0.0.1"));
    assert_eq!(connect.get("heart-beat"), Some("4000,4000"));

    assert_eq!(session.connect().await.unwrap(), ConnectOutcome::AlreadyConnected);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_concurrent_connect_reports_in_progress() {
    let broker = Broker::start("0,0").await;
    let session = ChatSession::new(broker.config());

    let (first, second) = tokio::join!(session.connect(), session.connect());
    assert_eq!(first.unwrap(), ConnectOutcome::Established);
    assert_eq!(second.unwrap(), ConnectOutcome::InProgress);
}

#[tokio::test]
async fn test_connect_failure_leaves_session_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = ChatSession::new(TransportConfig::new(format!("ws://{}/ws", addr)));
    assert!(matches!(session.connect().await, Err(CoreError::Transport(_))));
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_duplicate_subscribe_shares_one_channel() {
    let mut broker = Broker::start("0,0").await;
    let config = broker.config();
    let session = connected(&mut broker, config).await;

    let first = session.subscribe_room(3).unwrap();
    let second = session.subscribe_room(3).unwrap();
    assert_eq!(first.id(), second.id());
    assert!(first.same_channel(&second));

    let subscribe = broker.expect(Command::Subscribe).await;
    assert_eq!(subscribe.get("destination"), Some("/topic/chat/3"));
    let sub_id = subscribe.get("id").unwrap().to_string();

    broker.deliver(&sub_id, 3, &message_json(1, 3, "hello"));
    let received = timeout(WAIT, first.next_message()).await.unwrap().unwrap();
    assert_eq!(received.content, "hello");
    // delivered once, not once per handle
    assert!(timeout(Duration::from_millis(200), second.next_message()).await.is_err());

    // only one SUBSCRIBE went out
    session.send_message(&OutgoingMessage::text(3, "marker")).unwrap();
    assert_eq!(broker.frame().await.command, Command::Send);
}

#[tokio::test]
async fn test_malformed_body_is_dropped() {
    let mut broker = Broker::start("0,0").await;
    let config = broker.config();
    let session = connected(&mut broker, config).await;
    let room = session.subscribe_room(5).unwrap();
    let sub_id = broker.expect(Command::Subscribe).await.get("id").unwrap().to_string();

    broker.deliver(&sub_id, 5, "{not json");
    broker.deliver(&sub_id, 5, &json!({"id": 2}).to_string());
    broker.deliver(&sub_id, 5, &message_json(3, 5, "still here"));

    let received = timeout(WAIT, room.next_message()).await.unwrap().unwrap();
    assert_eq!(received.id, 3);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_messages_arrive_in_transport_order() {
    let mut broker = Broker::start("0,0").await;
    let config = broker.config();
    let session = connected(&mut broker, config).await;
    let room = session.subscribe_room(8).unwrap();
    let sub_id = broker.expect(Command::Subscribe).await.get("id").unwrap().to_string();

    for id in [4, 2, 9, 2] {
        broker.deliver(&sub_id, 8, &message_json(id, 8, "x"));
    }
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(timeout(WAIT, room.next_message()).await.unwrap().unwrap().id);
    }
    assert_eq!(ids, vec![4, 2, 9, 2]);
}

#[tokio::test]
async fn test_publish_destinations_and_bodies() {
    let mut broker = Broker::start("0,0").await;
    let config = broker.config();
    let session = connected(&mut broker, config).await;

    session
        .send_message(&OutgoingMessage::location(3, "Hallasan", 33.36, 126.53))
        .unwrap();
    let send = broker.expect(Command::Send).await;
    assert_eq!(send.get("destination"), Some("/app/chat.sendMessage"));
    let body: Value = serde_json::from_str(&send.body).unwrap();
    assert_eq!(body["messageType"], "LOCATION");
    assert_eq!(body["chatRoomId"], 3);
    assert!(body.get("imageUrl").is_none());

    session.announce_presence(3, "mina").unwrap();
    let presence = broker.expect(Command::Send).await;
    assert_eq!(presence.get("destination"), Some("/app/chat.addUser"));
    let body: Value = serde_json::from_str(&presence.body).unwrap();
    assert_eq!(body["messageType"], "SYSTEM");
    assert!(body["content"].as_str().unwrap().contains("mina"));

    session.notify_typing(3, "mina").unwrap();
    let typing = broker.expect(Command::Send).await;
    assert_eq!(typing.get("destination"), Some("/app/chat.typing/3"));
    assert_eq!(typing.body, r#"{"userName":"mina"}"#);
}

#[tokio::test]
async fn test_send_while_disconnected_publishes_nothing() {
    let mut broker = Broker::start("0,0").await;
    let session = ChatSession::new(broker.config());

    assert!(matches!(
        session.send_message(&OutgoingMessage::text(1, "lost")),
        Err(CoreError::NotConnected)
    ));
    assert!(matches!(session.announce_presence(1, "mina"), Err(CoreError::NotConnected)));
    assert!(matches!(session.subscribe_room(1), Err(CoreError::NotConnected)));

    session.connect().await.unwrap();
    broker.expect(Command::Connect).await;
    session.subscribe_room(1).unwrap();
    broker.expect(Command::Subscribe).await;

    session.disconnect();
    assert!(matches!(
        session.send_message(&OutgoingMessage::text(1, "late")),
        Err(CoreError::NotConnected)
    ));
    broker.expect(Command::Unsubscribe).await;
    broker.expect(Command::Disconnect).await;
    // disconnecting again is a no-op
    session.disconnect();
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_unsubscribe_closes_handle() {
    let mut broker = Broker::start("0,0").await;
    let config = broker.config();
    let session = connected(&mut broker, config).await;
    let room = session.subscribe_room(4).unwrap();
    let sub_id = broker.expect(Command::Subscribe).await.get("id").unwrap().to_string();

    session.unsubscribe_room(4);
    let unsubscribe = broker.expect(Command::Unsubscribe).await;
    assert_eq!(unsubscribe.get("id"), Some(sub_id.as_str()));
    assert!(timeout(WAIT, room.next_message()).await.unwrap().is_none());

    // not subscribed any more: nothing to send
    session.unsubscribe_room(4);
    session.send_message(&OutgoingMessage::text(4, "marker")).unwrap();
    assert_eq!(broker.frame().await.command, Command::Send);
}

#[tokio::test]
async fn test_room_guard_unsubscribes_on_drop() {
    let mut broker = Broker::start("0,0").await;
    let config = broker.config();
    let session = connected(&mut broker, config).await;

    {
        let guard = session.join_room(6).unwrap();
        assert_eq!(guard.room_id(), 6);
        broker.expect(Command::Subscribe).await;
    }
    broker.expect(Command::Unsubscribe).await;

    // the room can be joined again with a fresh subscription
    let again = session.join_room(6).unwrap();
    let subscribe = broker.expect(Command::Subscribe).await;
    assert_eq!(subscribe.get("id"), Some(again.subscription().id()));
}

#[tokio::test]
async fn test_room_stays_subscribed_while_another_guard_lives() {
    let mut broker = Broker::start("0,0").await;
    let config = broker.config();
    let session = connected(&mut broker, config).await;

    let first = session.join_room(6).unwrap();
    let second = session.join_room(6).unwrap();
    let sub_id = broker.expect(Command::Subscribe).await.get("id").unwrap().to_string();

    drop(first);
    broker.deliver(&sub_id, 6, &message_json(61, 6, "still here"));
    let message = timeout(WAIT, second.next_message()).await.unwrap().unwrap();
    assert_eq!(message.content, "still here");

    drop(second);
    broker.expect(Command::Unsubscribe).await;
}

#[tokio::test]
async fn test_stale_subscription_id_is_not_rerouted() {
    let mut broker = Broker::start("0,0").await;
    let config = broker.config();
    let session = connected(&mut broker, config).await;

    let old = session.subscribe_room(8).unwrap();
    let old_id = old.id().to_string();
    broker.expect(Command::Subscribe).await;
    session.unsubscribe_room(8);
    broker.expect(Command::Unsubscribe).await;

    let room = session.subscribe_room(8).unwrap();
    let new_id = broker.expect(Command::Subscribe).await.get("id").unwrap().to_string();
    assert_ne!(old_id, new_id);

    broker.deliver(&old_id, 8, &message_json(81, 8, "stale"));
    broker.deliver(&new_id, 8, &message_json(82, 8, "fresh"));
    let message = timeout(WAIT, room.next_message()).await.unwrap().unwrap();
    assert_eq!(message.id, 82);
}

#[tokio::test]
async fn test_reconnect_restores_subscriptions() {
    let mut broker = Broker::start("0,0").await;
    let mut config = broker.config();
    config.reconnect_delay = Duration::from_millis(50);
    let session = connected(&mut broker, config).await;
    let mut events = session.events();

    let room = session.subscribe_room(2).unwrap();
    let sub_id = broker.expect(Command::Subscribe).await.get("id").unwrap().to_string();

    broker.push.send(DROP_CONNECTION.to_string()).unwrap();
    assert!(matches!(next_event(&mut events).await, SessionEvent::Disconnected { .. }));
    assert_eq!(next_event(&mut events).await, SessionEvent::Reconnecting { attempt: 1 });
    assert_eq!(next_event(&mut events).await, SessionEvent::Reconnected);
    assert!(session.is_connected());

    broker.expect(Command::Connect).await;
    let resubscribe = broker.expect(Command::Subscribe).await;
    assert_eq!(resubscribe.get("id"), Some(sub_id.as_str()));
    assert_eq!(resubscribe.get("destination"), Some("/topic/chat/2"));

    broker.deliver(&sub_id, 2, &message_json(21, 2, "back again"));
    let received = timeout(WAIT, room.next_message()).await.unwrap().unwrap();
    assert_eq!(received.content, "back again");
}

#[tokio::test]
async fn test_lost_connection_without_reconnect() {
    let mut broker = Broker::start("0,0").await;
    let config = broker.config();
    let session = connected(&mut broker, config).await;
    let mut events = session.events();
    let room = session.subscribe_room(2).unwrap();
    broker.expect(Command::Subscribe).await;

    broker.push.send(DROP_CONNECTION.to_string()).unwrap();
    assert!(matches!(next_event(&mut events).await, SessionEvent::Disconnected { .. }));
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(timeout(WAIT, room.next_message()).await.unwrap().is_none());
    assert!(matches!(
        session.send_message(&OutgoingMessage::text(2, "x")),
        Err(CoreError::NotConnected)
    ));
}

#[tokio::test]
async fn test_outgoing_heartbeats_are_sent() {
    let mut broker = Broker::start("0,50").await;
    let mut config = broker.config();
    config.heartbeat_outgoing = Duration::from_millis(50);
    let _session = connected(&mut broker, config).await;

    let beat = timeout(WAIT, broker.inbound.recv()).await.unwrap().unwrap();
    assert_eq!(beat, Inbound::Heartbeat);
}

#[tokio::test]
async fn test_silent_broker_trips_watchdog() {
    let mut broker = Broker::start("50,0").await;
    let mut config = broker.config();
    config.heartbeat_incoming = Duration::from_millis(50);
    let session = connected(&mut broker, config).await;
    let mut events = session.events();

    match next_event(&mut events).await {
        SessionEvent::Disconnected { reason } => assert!(reason.contains("heart-beat"), "{}", reason),
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

struct FakeChats {
    history: Vec<ChatMessage>,
    since: Vec<ChatMessage>,
    deleted: StdMutex<Vec<i64>>,
}

fn stamp(second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 5, 1)
        .unwrap()
        .and_hms_opt(10, 0, second)
        .unwrap()
}

fn stored(id: i64, second: u32) -> ChatMessage {
    serde_json::from_str(&message_json(id, 9, &format!("m{}", id)))
        .map(|m: ChatMessage| ChatMessage {
            created_at: stamp(second),
            ..m
        })
        .unwrap()
}

#[async_trait]
impl ChatRepository for FakeChats {
    async fn room_for_trip(&self, trip_id: i64) -> CoreResult<ChatRoom> {
        Ok(ChatRoom {
            id: 9,
            trip_id,
            name: Some("Jeju".to_string()),
            created_at: stamp(0),
            last_message_at: None,
            active: true,
        })
    }

    async fn messages(&self, _room_id: i64, _page: u32, size: u32) -> CoreResult<Page<ChatMessage>> {
        Ok(Page {
            content: self.history.iter().take(size as usize).cloned().collect(),
            number: 0,
            size,
            total_elements: self.history.len() as u64,
            total_pages: 1,
            last: true,
        })
    }

    async fn messages_since(&self, _room_id: i64, _since: NaiveDateTime) -> CoreResult<Vec<ChatMessage>> {
        Ok(self.since.clone())
    }

    async fn mark_read(&self, _room_id: i64, _message_id: i64) -> CoreResult<()> {
        Ok(())
    }

    async fn delete_message(&self, message_id: i64) -> CoreResult<()> {
        self.deleted.lock().unwrap().push(message_id);
        Ok(())
    }
}

#[tokio::test]
async fn test_room_feed_history_live_and_catch_up() {
    let mut broker = Broker::start("0,0").await;
    let chats = Arc::new(FakeChats {
        // newest first, as the backend pages them
        history: vec![stored(3, 3), stored(2, 2), stored(1, 1)],
        since: vec![stored(4, 4), stored(5, 5)],
        deleted: StdMutex::new(Vec::new()),
    });
    let identity = StaticIdentity::new(1, "mina");

    let mut feed = RoomFeed::open(ChatSession::new(broker.config()), chats.clone(), &identity, 77, 20)
        .await
        .unwrap();
    assert_eq!(feed.room().trip_id, 77);
    let ids: Vec<i64> = feed.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    broker.expect(Command::Connect).await;
    let subscribe = broker.expect(Command::Subscribe).await;
    assert_eq!(subscribe.get("destination"), Some("/topic/chat/9"));
    let presence = broker.expect(Command::Send).await;
    assert_eq!(presence.get("destination"), Some("/app/chat.addUser"));

    let sub_id = subscribe.get("id").unwrap().to_string();
    broker.deliver(&sub_id, 9, &serde_json::to_string(&stored(4, 4)).unwrap());
    let live = timeout(WAIT, feed.next()).await.unwrap().unwrap();
    assert_eq!(live.id, 4);

    // 4 already arrived live, only 5 is new
    assert_eq!(feed.catch_up().await.unwrap(), 1);
    let ids: Vec<i64> = feed.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    feed.send_text("see you at the port").unwrap();
    let send = broker.expect(Command::Send).await;
    assert!(send.body.contains("see you at the port"));

    feed.delete_message(2).await.unwrap();
    assert!(feed.messages()[1].deleted);
    assert_eq!(*chats.deleted.lock().unwrap(), vec![2]);

    drop(feed);
    broker.expect(Command::Unsubscribe).await;
}
