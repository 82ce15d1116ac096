use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;
use tripmate_core::{CoreError, CoreResult, TripDayRepository, TripRepository, Validate};
use tripmate_shared::{DayRequest, Trip, TripDay, TripDraft};

/// Trip CRUD plus the day skeleton every trip carries
pub struct TripPlanner {
    trips: Arc<dyn TripRepository>,
    days: Arc<dyn TripDayRepository>,
}

impl TripPlanner {
    pub fn new(trips: Arc<dyn TripRepository>, days: Arc<dyn TripDayRepository>) -> Self {
        Self { trips, days }
    }

    pub async fn trips(&self) -> CoreResult<Vec<Trip>> {
        self.trips.list_trips().await
    }

    pub async fn trip(&self, trip_id: i64) -> CoreResult<Trip> {
        self.trips.get_trip(trip_id).await
    }

    /// Creates the trip and one day per date of its span.
    pub async fn create_trip(&self, draft: TripDraft) -> CoreResult<Trip> {
        draft.validate()?;
        self.trips.create_trip(&draft).await?;

        // The create call returns no body, so pick the newest matching trip.
        let trip = self
            .trips
            .list_trips()
            .await?
            .into_iter()
            .filter(|t| draft.matches(t))
            .max_by_key(|t| t.id)
            .ok_or_else(|| CoreError::Protocol(format!("created trip '{}' not listed", draft.title)))?;
        info!("Created trip {} ({} days)", trip.id, trip.span_days());

        self.ensure_days(&trip).await?;
        Ok(trip)
    }

    pub async fn update_trip(&self, trip_id: i64, draft: TripDraft) -> CoreResult<Trip> {
        draft.validate()?;
        self.trips.update_trip(trip_id, &draft).await?;
        let trip = self.trips.get_trip(trip_id).await?;
        self.ensure_days(&trip).await?;
        Ok(trip)
    }

    pub async fn delete_trip(&self, trip_id: i64) -> CoreResult<()> {
        self.trips.delete_trip(trip_id).await?;
        info!("Deleted trip {}", trip_id);
        Ok(())
    }

    /// Days of a trip sorted by day number.
    pub async fn days(&self, trip_id: i64) -> CoreResult<Vec<TripDay>> {
        let mut days = self.days.list_days(trip_id).await?;
        days.sort_by_key(|d| d.day);
        Ok(days)
    }

    /// Creates every day of the trip's span that does not exist yet.
    pub async fn ensure_days(&self, trip: &Trip) -> CoreResult<Vec<TripDay>> {
        let mut days = self.days(trip.id).await?;
        let missing: Vec<NaiveDate> = trip
            .dates()
            .filter(|date| !days.iter().any(|d| d.date == *date))
            .collect();

        for date in missing {
            let request = DayRequest {
                day: (date - trip.start_date).num_days() as u32 + 1,
                date,
            };
            days.push(self.days.create_day(trip.id, &request).await?);
        }
        days.sort_by_key(|d| d.day);
        Ok(days)
    }

    pub async fn add_day(&self, trip: &Trip, date: NaiveDate) -> CoreResult<TripDay> {
        let day = trip.day_number(date).ok_or_else(|| {
            CoreError::Validation(format!(
                "{} is outside {}..={}",
                date, trip.start_date, trip.end_date
            ))
        })?;
        if self.days(trip.id).await?.iter().any(|d| d.date == date) {
            return Err(CoreError::Validation(format!("day for {} already exists", date)));
        }
        self.days.create_day(trip.id, &DayRequest { day, date }).await
    }

    pub async fn remove_day(&self, trip_id: i64, day_id: i64) -> CoreResult<()> {
        if !self.days(trip_id).await?.iter().any(|d| d.id == day_id) {
            return Err(CoreError::not_found("day", day_id));
        }
        self.days.delete_day(trip_id, day_id).await?;
        info!("Removed day {} from trip {}", day_id, trip_id);
        Ok(())
    }
}
