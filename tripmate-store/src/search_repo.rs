use async_trait::async_trait;
use tracing::debug;
use tripmate_core::{CoreResult, PlaceCandidate, PlaceSearch, PlaceSearchQuery, PlaceSearchResponse};

use crate::client::ApiClient;

/// Place search proxied through the backend
pub struct HttpPlaceSearch {
    client: ApiClient,
}

impl HttpPlaceSearch {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlaceSearch for HttpPlaceSearch {
    async fn search(&self, query: &PlaceSearchQuery) -> CoreResult<Vec<PlaceCandidate>> {
        let mut params = vec![
            ("keyword", query.keyword.clone()),
            ("lat", query.lat.to_string()),
            ("lng", query.lng.to_string()),
            ("page", query.page.to_string()),
            ("size", query.size.to_string()),
        ];
        if let Some(trip_id) = query.trip_id {
            params.push(("tripId", trip_id.to_string()));
        }
        let response: PlaceSearchResponse = self.client.get("/search/places", &params).await?;
        debug!("Search '{}' returned {} places", query.keyword, response.documents.len());
        Ok(response.documents)
    }
}
