use async_trait::async_trait;
use tripmate_core::repository::TripPlaceRepository;
use tripmate_core::CoreResult;
use tripmate_shared::{PlaceRequest, TripPlace, VisitOrderUpdate};

use crate::client::ApiClient;

pub struct HttpPlaceRepository {
    client: ApiClient,
}

impl HttpPlaceRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

fn places_path(day_id: i64) -> String {
    format!("/trip-days/{}/places", day_id)
}

#[async_trait]
impl TripPlaceRepository for HttpPlaceRepository {
    async fn list_places(&self, day_id: i64) -> CoreResult<Vec<TripPlace>> {
        self.client.get(&places_path(day_id), &[]).await
    }

    async fn create_place(&self, day_id: i64, place: &PlaceRequest) -> CoreResult<TripPlace> {
        self.client.post(&places_path(day_id), place).await
    }

    async fn update_place(
        &self,
        day_id: i64,
        place_id: i64,
        place: &PlaceRequest,
    ) -> CoreResult<TripPlace> {
        self.client
            .put(&format!("{}/{}", places_path(day_id), place_id), place)
            .await
    }

    async fn update_visit_order(
        &self,
        day_id: i64,
        place_id: i64,
        visit_order: u32,
    ) -> CoreResult<TripPlace> {
        self.client
            .patch(
                &format!("{}/{}/order", places_path(day_id), place_id),
                &VisitOrderUpdate { visit_order },
            )
            .await
    }

    async fn delete_place(&self, day_id: i64, place_id: i64) -> CoreResult<()> {
        self.client
            .delete(&format!("{}/{}", places_path(day_id), place_id))
            .await
    }
}
