use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A trip as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: i64,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_lat: Option<f64>,
    #[serde(default)]
    pub region_lng: Option<f64>,
}

impl Trip {
    /// Number of calendar days covered, both ends inclusive.
    pub fn span_days(&self) -> u32 {
        let days = (self.end_date - self.start_date).num_days();
        if days < 0 {
            0
        } else {
            days as u32 + 1
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// 1-based day number of `date` within the trip
    pub fn day_number(&self, date: NaiveDate) -> Option<u32> {
        if !self.contains(date) {
            return None;
        }
        Some((date - self.start_date).num_days() as u32 + 1)
    }

    /// Every date of the trip in order
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start_date
            .iter_days()
            .take_while(move |d| *d <= self.end_date)
    }
}

/// Create / modify request for a trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDraft {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub longitude: Option<f64>,
}

impl TripDraft {
    pub fn new(title: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            start_date,
            end_date,
            region: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn matches(&self, trip: &Trip) -> bool {
        trip.title == self.title
            && trip.start_date == self.start_date
            && trip.end_date == self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDay {
    pub id: i64,
    pub day: u32,
    pub date: NaiveDate,
    pub trip_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRequest {
    pub day: u32,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A place on one day of the itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlace {
    pub id: i64,
    /// Id of the place in the external search provider
    #[serde(default)]
    pub place_id: Option<String>,
    pub place_name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub visit_time: Option<NaiveTime>,
    pub visit_order: u32,
}

impl TripPlace {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// User input for a place before it has a position in the day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceDraft {
    pub place_name: String,
    pub address: String,
    pub coordinate: Option<Coordinate>,
    pub memo: Option<String>,
    pub place_id: Option<String>,
    pub visit_time: Option<NaiveTime>,
}

impl PlaceDraft {
    pub fn new(
        place_name: impl Into<String>,
        address: impl Into<String>,
        coordinate: Coordinate,
    ) -> Self {
        Self {
            place_name: place_name.into(),
            address: address.into(),
            coordinate: Some(coordinate),
            ..Default::default()
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_visit_time(mut self, visit_time: NaiveTime) -> Self {
        self.visit_time = Some(visit_time);
        self
    }

    /// Wire body for create/update. `None` when the coordinate is missing.
    pub fn to_request(&self, visit_order: u32) -> Option<PlaceRequest> {
        let coordinate = self.coordinate?;
        Some(PlaceRequest {
            place_name: self.place_name.trim().to_string(),
            address: self.address.trim().to_string(),
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            memo: self.memo.clone(),
            place_id: self.place_id.clone(),
            visit_time: self.visit_time.unwrap_or_else(default_visit_time),
            visit_order,
        })
    }
}

impl From<&TripPlace> for PlaceDraft {
    fn from(place: &TripPlace) -> Self {
        Self {
            place_name: place.place_name.clone(),
            address: place.address.clone(),
            coordinate: Some(place.coordinate()),
            memo: place.memo.clone(),
            place_id: place.place_id.clone(),
            visit_time: place.visit_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRequest {
    pub place_name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub place_id: Option<String>,
    pub visit_time: NaiveTime,
    pub visit_order: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitOrderUpdate {
    pub visit_order: u32,
}

/// Visit time used when the user did not pick one
pub fn default_visit_time() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN)
}
