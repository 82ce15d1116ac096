use chrono::NaiveDateTime;
use tripmate_shared::{Coordinate, PlaceDraft, ShareSettings, TripDraft};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

const TRIP_TITLE_MAX: usize = 100;
const REGION_MAX: usize = 100;
const PLACE_NAME_MAX: usize = 200;
const ADDRESS_MAX: usize = 300;
const MEMO_MAX: usize = 500;
const PLACE_ID_MAX: usize = 100;

/// Client-side checks mirroring the backend's request constraints
pub trait Validate {
    fn validate(&self) -> CoreResult<()>;
}

fn required(field: &str, value: &str, max: usize) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{} is required", field)));
    }
    bounded(field, value, max)
}

fn bounded(field: &str, value: &str, max: usize) -> CoreResult<()> {
    if value.chars().count() > max {
        return Err(CoreError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

fn coordinate(latitude: f64, longitude: f64) -> CoreResult<()> {
    if !Coordinate::new(latitude, longitude).is_valid() {
        return Err(CoreError::Validation(format!(
            "coordinate ({}, {}) is out of range",
            latitude, longitude
        )));
    }
    Ok(())
}

impl Validate for TripDraft {
    fn validate(&self) -> CoreResult<()> {
        required("title", &self.title, TRIP_TITLE_MAX)?;
        if self.end_date < self.start_date {
            return Err(CoreError::Validation(
                "end date must not be before start date".to_string(),
            ));
        }
        if let Some(region) = &self.region {
            bounded("region", region, REGION_MAX)?;
        }
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => coordinate(lat, lng)?,
            (None, None) => {}
            _ => {
                return Err(CoreError::Validation(
                    "region latitude and longitude must be given together".to_string(),
                ))
            }
        }
        Ok(())
    }
}

impl Validate for PlaceDraft {
    fn validate(&self) -> CoreResult<()> {
        required("placeName", &self.place_name, PLACE_NAME_MAX)?;
        required("address", &self.address, ADDRESS_MAX)?;
        let point = self
            .coordinate
            .ok_or_else(|| CoreError::Validation("coordinate is required".to_string()))?;
        coordinate(point.latitude, point.longitude)?;
        if let Some(memo) = &self.memo {
            bounded("memo", memo, MEMO_MAX)?;
        }
        if let Some(place_id) = &self.place_id {
            bounded("placeId", place_id, PLACE_ID_MAX)?;
        }
        Ok(())
    }
}

/// Expiry must lie in the future relative to `now`.
pub fn validate_share_settings(settings: &ShareSettings, now: NaiveDateTime) -> CoreResult<()> {
    match settings.expiry_date {
        Some(expiry) if expiry <= now => Err(CoreError::Validation(
            "expiry date must be in the future".to_string(),
        )),
        _ => Ok(()),
    }
}

impl Validate for ShareSettings {
    fn validate(&self) -> CoreResult<()> {
        validate_share_settings(self, chrono::Local::now().naive_local())
    }
}

/// Normalises a share token, rejecting anything that is not a UUID.
pub fn parse_share_token(raw: &str) -> CoreResult<String> {
    Uuid::parse_str(raw.trim())
        .map(|token| token.hyphenated().to_string())
        .map_err(|_| CoreError::Validation("share token is malformed".to_string()))
}
