use async_trait::async_trait;
use tripmate_core::repository::{TripDayRepository, TripRepository};
use tripmate_core::CoreResult;
use tripmate_shared::{DayRequest, Trip, TripDay, TripDraft};

use crate::client::ApiClient;

pub struct HttpTripRepository {
    client: ApiClient,
}

impl HttpTripRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TripRepository for HttpTripRepository {
    async fn list_trips(&self) -> CoreResult<Vec<Trip>> {
        self.client.get("/trips", &[]).await
    }

    async fn get_trip(&self, trip_id: i64) -> CoreResult<Trip> {
        self.client.get(&format!("/trips/{}", trip_id), &[]).await
    }

    async fn create_trip(&self, draft: &TripDraft) -> CoreResult<()> {
        self.client.post_unit("/trips", draft).await
    }

    async fn update_trip(&self, trip_id: i64, draft: &TripDraft) -> CoreResult<()> {
        self.client.put_unit(&format!("/trips/{}", trip_id), draft).await
    }

    async fn delete_trip(&self, trip_id: i64) -> CoreResult<()> {
        self.client.delete(&format!("/trips/{}", trip_id)).await
    }
}

#[async_trait]
impl TripDayRepository for HttpTripRepository {
    async fn list_days(&self, trip_id: i64) -> CoreResult<Vec<TripDay>> {
        self.client.get(&format!("/trips/{}/days", trip_id), &[]).await
    }

    async fn create_day(&self, trip_id: i64, day: &DayRequest) -> CoreResult<TripDay> {
        self.client.post(&format!("/trips/{}/days", trip_id), day).await
    }

    async fn delete_day(&self, trip_id: i64, day_id: i64) -> CoreResult<()> {
        self.client
            .delete(&format!("/trips/{}/days/{}", trip_id, day_id))
            .await
    }
}
