use async_trait::async_trait;
use tracing::debug;
use tripmate_core::repository::ShareRepository;
use tripmate_core::CoreResult;
use tripmate_shared::{Page, ShareSettings, ShareSort, TokenHint, TripShare};

use crate::client::ApiClient;

pub struct HttpShareRepository {
    client: ApiClient,
}

impl HttpShareRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

fn trip_share_path(trip_id: i64) -> String {
    format!("/trip-shares/trips/{}", trip_id)
}

#[async_trait]
impl ShareRepository for HttpShareRepository {
    async fn create_share(&self, trip_id: i64, settings: &ShareSettings) -> CoreResult<TripShare> {
        self.client.post(&trip_share_path(trip_id), settings).await
    }

    async fn update_share(&self, trip_id: i64, settings: &ShareSettings) -> CoreResult<TripShare> {
        self.client.put(&trip_share_path(trip_id), settings).await
    }

    async fn delete_share(&self, trip_id: i64) -> CoreResult<()> {
        self.client.delete(&trip_share_path(trip_id)).await
    }

    async fn shared_trip(&self, share_token: &str) -> CoreResult<TripShare> {
        debug!("Opening shared trip {}", TokenHint(share_token));
        self.client
            .get(&format!("/trip-shares/shared/{}", share_token), &[])
            .await
    }

    async fn my_shares(&self) -> CoreResult<Vec<TripShare>> {
        self.client.get("/trip-shares/my-shares", &[]).await
    }

    async fn public_shares(
        &self,
        page: u32,
        size: u32,
        sort: ShareSort,
    ) -> CoreResult<Page<TripShare>> {
        self.client
            .get(
                "/trip-shares/public",
                &[
                    ("page", page.to_string()),
                    ("size", size.to_string()),
                    ("sortBy", sort.as_str().to_string()),
                ],
            )
            .await
    }
}
