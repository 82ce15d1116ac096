use async_trait::async_trait;
use chrono::NaiveDateTime;
use tripmate_core::repository::ChatRepository;
use tripmate_core::CoreResult;
use tripmate_shared::{ChatMessage, ChatRoom, Page, ReadReceipt};

use crate::client::ApiClient;

pub struct HttpChatRepository {
    client: ApiClient,
}

impl HttpChatRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatRepository for HttpChatRepository {
    async fn room_for_trip(&self, trip_id: i64) -> CoreResult<ChatRoom> {
        self.client
            .get(&format!("/chat/rooms/trip/{}", trip_id), &[])
            .await
    }

    async fn messages(&self, room_id: i64, page: u32, size: u32) -> CoreResult<Page<ChatMessage>> {
        self.client
            .get(
                &format!("/chat/rooms/{}/messages", room_id),
                &[("page", page.to_string()), ("size", size.to_string())],
            )
            .await
    }

    async fn messages_since(
        &self,
        room_id: i64,
        since: NaiveDateTime,
    ) -> CoreResult<Vec<ChatMessage>> {
        self.client
            .get(
                &format!("/chat/rooms/{}/messages/since", room_id),
                &[("since", since.format("%Y-%m-%dT%H:%M:%S").to_string())],
            )
            .await
    }

    async fn mark_read(&self, room_id: i64, message_id: i64) -> CoreResult<()> {
        self.client
            .post_unit(
                &format!("/chat/rooms/{}/read", room_id),
                &ReadReceipt { message_id },
            )
            .await
    }

    async fn delete_message(&self, message_id: i64) -> CoreResult<()> {
        self.client
            .delete(&format!("/chat/messages/{}", message_id))
            .await
    }
}
