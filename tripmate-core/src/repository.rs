use async_trait::async_trait;
use chrono::NaiveDateTime;
use tripmate_shared::{
    ChatMessage, ChatRoom, DayRequest, Page, PlaceRequest, ShareSettings, ShareSort, Trip,
    TripDay, TripDraft, TripPlace, TripShare,
};

use crate::CoreResult;

/// Repository trait for trips owned by the signed-in member
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn list_trips(&self) -> CoreResult<Vec<Trip>>;

    async fn get_trip(&self, trip_id: i64) -> CoreResult<Trip>;

    /// The backend answers with an empty body; callers look the trip up afterwards.
    async fn create_trip(&self, draft: &TripDraft) -> CoreResult<()>;

    async fn update_trip(&self, trip_id: i64, draft: &TripDraft) -> CoreResult<()>;

    async fn delete_trip(&self, trip_id: i64) -> CoreResult<()>;
}

/// Repository trait for the days of a trip
#[async_trait]
pub trait TripDayRepository: Send + Sync {
    async fn list_days(&self, trip_id: i64) -> CoreResult<Vec<TripDay>>;

    async fn create_day(&self, trip_id: i64, day: &DayRequest) -> CoreResult<TripDay>;

    async fn delete_day(&self, trip_id: i64, day_id: i64) -> CoreResult<()>;
}

/// Repository trait for the places of a day.
///
/// `list_places` makes no ordering promise and `update_visit_order` may only
/// touch the target record; the itinerary service restores density itself.
#[async_trait]
pub trait TripPlaceRepository: Send + Sync {
    async fn list_places(&self, day_id: i64) -> CoreResult<Vec<TripPlace>>;

    async fn create_place(&self, day_id: i64, place: &PlaceRequest) -> CoreResult<TripPlace>;

    async fn update_place(
        &self,
        day_id: i64,
        place_id: i64,
        place: &PlaceRequest,
    ) -> CoreResult<TripPlace>;

    async fn update_visit_order(
        &self,
        day_id: i64,
        place_id: i64,
        visit_order: u32,
    ) -> CoreResult<TripPlace>;

    async fn delete_place(&self, day_id: i64, place_id: i64) -> CoreResult<()>;
}

/// Repository trait for chat rooms and message history
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Looks up the room of a trip, creating it on first access.
    async fn room_for_trip(&self, trip_id: i64) -> CoreResult<ChatRoom>;

    /// Newest first, as the backend pages them.
    async fn messages(&self, room_id: i64, page: u32, size: u32) -> CoreResult<Page<ChatMessage>>;

    async fn messages_since(
        &self,
        room_id: i64,
        since: NaiveDateTime,
    ) -> CoreResult<Vec<ChatMessage>>;

    async fn mark_read(&self, room_id: i64, message_id: i64) -> CoreResult<()>;

    async fn delete_message(&self, message_id: i64) -> CoreResult<()>;
}

/// Repository trait for trip share links
#[async_trait]
pub trait ShareRepository: Send + Sync {
    async fn create_share(&self, trip_id: i64, settings: &ShareSettings) -> CoreResult<TripShare>;

    async fn update_share(&self, trip_id: i64, settings: &ShareSettings) -> CoreResult<TripShare>;

    async fn delete_share(&self, trip_id: i64) -> CoreResult<()>;

    /// Anonymous access by token; counts as a view.
    async fn shared_trip(&self, share_token: &str) -> CoreResult<TripShare>;

    async fn my_shares(&self) -> CoreResult<Vec<TripShare>>;

    async fn public_shares(
        &self,
        page: u32,
        size: u32,
        sort: ShareSort,
    ) -> CoreResult<Page<TripShare>>;
}
