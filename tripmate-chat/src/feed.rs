use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};
use tripmate_core::{ChatRepository, CoreResult, Identity, IdentityProvider};
use tripmate_shared::{ChatMessage, ChatRoom, OutgoingMessage};

use crate::session::{ChatSession, RoomGuard};

/// The chat of one trip: history plus live messages, in arrival order
pub struct RoomFeed {
    session: ChatSession,
    chats: Arc<dyn ChatRepository>,
    identity: Identity,
    room: ChatRoom,
    guard: RoomGuard,
    messages: Vec<ChatMessage>,
}

impl RoomFeed {
    /// Looks up the trip's room, joins it, announces us and loads the latest page.
    pub async fn open(
        session: ChatSession,
        chats: Arc<dyn ChatRepository>,
        identity: &dyn IdentityProvider,
        trip_id: i64,
        page_size: u32,
    ) -> CoreResult<Self> {
        let identity = identity.current().await?;
        let room = chats.room_for_trip(trip_id).await?;
        let outcome = session.connect().await?;
        debug!("Chat connect for trip {}: {:?}", trip_id, outcome);

        let guard = session.join_room(room.id)?;
        session.announce_presence(room.id, &identity.nickname)?;

        // Pages come newest first.
        let mut messages = chats.messages(room.id, 0, page_size).await?.content;
        messages.reverse();
        info!(
            "Opened chat room {} of trip {} with {} messages",
            room.id,
            trip_id,
            messages.len()
        );

        Ok(Self {
            session,
            chats,
            identity,
            room,
            guard,
            messages,
        })
    }

    pub fn room(&self) -> &ChatRoom {
        &self.room
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Waits for the next live message and appends it. `None` once the room closed.
    pub async fn next(&mut self) -> Option<&ChatMessage> {
        let message = self.guard.next_message().await?;
        self.messages.push(message);
        self.messages.last()
    }

    /// Pulls what was posted since the newest message we hold, e.g. after a
    /// reconnect. Returns how many were new.
    pub async fn catch_up(&mut self) -> CoreResult<usize> {
        let since = self
            .messages
            .last()
            .map(|m| m.created_at)
            .unwrap_or(self.room.created_at);
        let fetched = self.chats.messages_since(self.room.id, since).await?;

        let known: HashSet<i64> = self.messages.iter().map(|m| m.id).collect();
        let before = self.messages.len();
        self.messages
            .extend(fetched.into_iter().filter(|m| !known.contains(&m.id)));
        Ok(self.messages.len() - before)
    }

    pub fn send_text(&self, text: &str) -> CoreResult<()> {
        self.session
            .send_message(&OutgoingMessage::text(self.room.id, text))
    }

    pub fn send_image(&self, caption: &str, image_url: &str) -> CoreResult<()> {
        self.session
            .send_message(&OutgoingMessage::image(self.room.id, caption, image_url))
    }

    pub fn send_location(&self, label: &str, latitude: f64, longitude: f64) -> CoreResult<()> {
        self.session.send_message(&OutgoingMessage::location(
            self.room.id,
            label,
            latitude,
            longitude,
        ))
    }

    pub fn typing(&self) -> CoreResult<()> {
        self.session
            .notify_typing(self.room.id, &self.identity.nickname)
    }

    pub async fn mark_read(&self, message_id: i64) -> CoreResult<()> {
        self.chats.mark_read(self.room.id, message_id).await
    }

    pub async fn delete_message(&mut self, message_id: i64) -> CoreResult<()> {
        self.chats.delete_message(message_id).await?;
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.deleted = true;
        }
        Ok(())
    }
}
