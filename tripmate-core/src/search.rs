use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tripmate_shared::{Coordinate, PlaceDraft};

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceSearchQuery {
    pub keyword: String,
    pub lat: f64,
    pub lng: f64,
    pub page: u32,
    pub size: u32,
    #[serde(rename = "tripId", skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<i64>,
}

impl PlaceSearchQuery {
    pub fn new(keyword: impl Into<String>, around: Coordinate) -> Self {
        Self {
            keyword: keyword.into(),
            lat: around.latitude,
            lng: around.longitude,
            page: 1,
            size: 15,
            trip_id: None,
        }
    }
}

/// One hit of the place search provider. Coordinates arrive as strings
/// (`x` = longitude, `y` = latitude).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaceCandidate {
    pub id: String,
    pub place_name: String,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub address_name: String,
    #[serde(default)]
    pub road_address_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub place_url: Option<String>,
}

impl PlaceCandidate {
    pub fn coordinate(&self) -> CoreResult<Coordinate> {
        let longitude: f64 = self
            .x
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("bad longitude '{}' for {}", self.x, self.id)))?;
        let latitude: f64 = self
            .y
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("bad latitude '{}' for {}", self.y, self.id)))?;
        Ok(Coordinate::new(latitude, longitude))
    }

    /// Draft ready for `ItineraryService::append`. Prefers the road address.
    pub fn into_draft(self) -> CoreResult<PlaceDraft> {
        let coordinate = self.coordinate()?;
        let address = match self.road_address_name {
            Some(road) if !road.trim().is_empty() => road,
            _ => self.address_name,
        };
        Ok(PlaceDraft {
            place_name: self.place_name,
            address,
            coordinate: Some(coordinate),
            memo: None,
            place_id: Some(self.id),
            visit_time: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaceSearchResponse {
    #[serde(default)]
    pub documents: Vec<PlaceCandidate>,
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(&self, query: &PlaceSearchQuery) -> CoreResult<Vec<PlaceCandidate>>;
}
