//! In-process repositories with the backend's record-level semantics.
//! Used for offline runs and as the store behind service tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use tripmate_core::repository::{TripDayRepository, TripPlaceRepository, TripRepository};
use tripmate_core::{CoreError, CoreResult};
use tripmate_shared::{DayRequest, PlaceRequest, Trip, TripDay, TripDraft, TripPlace};

fn poisoned<T>(_: T) -> CoreError {
    CoreError::Transport("in-memory store lock poisoned".to_string())
}

/// Places keyed by day. `update_visit_order` only touches the target record
/// and `delete_place` leaves a gap, unless `atomic_reorder` is switched on.
#[derive(Default)]
pub struct InMemoryPlaceRepository {
    days: Mutex<HashMap<i64, Vec<TripPlace>>>,
    next_id: Mutex<i64>,
    atomic_reorder: bool,
    failing_reads: AtomicU32,
    failing_writes: AtomicU32,
    writes: AtomicUsize,
}

impl InMemoryPlaceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shifts neighbours on reorder and closes gaps on delete, like the live backend.
    pub fn with_atomic_reorder() -> Self {
        Self {
            atomic_reorder: true,
            ..Self::default()
        }
    }

    pub fn seed(&self, day_id: i64, places: Vec<TripPlace>) -> CoreResult<()> {
        let mut next_id = self.next_id.lock().map_err(poisoned)?;
        if let Some(max) = places.iter().map(|p| p.id).max() {
            *next_id = (*next_id).max(max);
        }
        self.days.lock().map_err(poisoned)?.insert(day_id, places);
        Ok(())
    }

    /// The next `n` list calls fail with a transport error.
    pub fn fail_reads(&self, n: u32) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// The next `n` write calls fail with a transport error.
    pub fn fail_writes(&self, n: u32) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn take_fault(counter: &AtomicU32, what: &str) -> CoreResult<()> {
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(CoreError::Transport(format!("injected {} failure", what)));
        }
        Ok(())
    }

    fn write<T>(
        &self,
        day_id: i64,
        f: impl FnOnce(&mut Vec<TripPlace>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        Self::take_fault(&self.failing_writes, "write")?;
        let mut days = self.days.lock().map_err(poisoned)?;
        let result = f(days.entry(day_id).or_default())?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(result)
    }
}

fn find(places: &mut [TripPlace], place_id: i64) -> CoreResult<&mut TripPlace> {
    places
        .iter_mut()
        .find(|p| p.id == place_id)
        .ok_or_else(|| CoreError::not_found("place", place_id))
}

fn apply_request(place: &mut TripPlace, request: &PlaceRequest) {
    place.place_name = request.place_name.clone();
    place.address = request.address.clone();
    place.latitude = request.latitude;
    place.longitude = request.longitude;
    place.memo = request.memo.clone();
    place.place_id = request.place_id.clone();
    place.visit_time = Some(request.visit_time);
}

#[async_trait]
impl TripPlaceRepository for InMemoryPlaceRepository {
    async fn list_places(&self, day_id: i64) -> CoreResult<Vec<TripPlace>> {
        Self::take_fault(&self.failing_reads, "read")?;
        let days = self.days.lock().map_err(poisoned)?;
        // Reverse insertion order: callers must not rely on list order.
        let mut places = days.get(&day_id).cloned().unwrap_or_default();
        places.reverse();
        Ok(places)
    }

    async fn create_place(&self, day_id: i64, request: &PlaceRequest) -> CoreResult<TripPlace> {
        let id = {
            let mut next_id = self.next_id.lock().map_err(poisoned)?;
            *next_id += 1;
            *next_id
        };
        self.write(day_id, |places| {
            let mut place = TripPlace {
                id,
                place_id: None,
                place_name: String::new(),
                address: String::new(),
                latitude: 0.0,
                longitude: 0.0,
                memo: None,
                visit_time: None,
                visit_order: request.visit_order,
            };
            apply_request(&mut place, request);
            places.push(place.clone());
            Ok(place)
        })
    }

    async fn update_place(
        &self,
        day_id: i64,
        place_id: i64,
        request: &PlaceRequest,
    ) -> CoreResult<TripPlace> {
        self.write(day_id, |places| {
            let place = find(places, place_id)?;
            apply_request(place, request);
            Ok(place.clone())
        })
    }

    async fn update_visit_order(
        &self,
        day_id: i64,
        place_id: i64,
        visit_order: u32,
    ) -> CoreResult<TripPlace> {
        let atomic = self.atomic_reorder;
        self.write(day_id, |places| {
            let old = find(places, place_id)?.visit_order;
            if atomic {
                for other in places.iter_mut().filter(|p| p.id != place_id) {
                    if old < visit_order && other.visit_order > old && other.visit_order <= visit_order {
                        other.visit_order -= 1;
                    } else if old > visit_order && other.visit_order >= visit_order && other.visit_order < old {
                        other.visit_order += 1;
                    }
                }
            }
            let place = find(places, place_id)?;
            place.visit_order = visit_order;
            Ok(place.clone())
        })
    }

    async fn delete_place(&self, day_id: i64, place_id: i64) -> CoreResult<()> {
        let atomic = self.atomic_reorder;
        self.write(day_id, |places| {
            let idx = places
                .iter()
                .position(|p| p.id == place_id)
                .ok_or_else(|| CoreError::not_found("place", place_id))?;
            let removed = places.remove(idx);
            if atomic {
                for other in places.iter_mut().filter(|p| p.visit_order > removed.visit_order) {
                    other.visit_order -= 1;
                }
            }
            Ok(())
        })
    }
}

/// Trips and their days
#[derive(Default)]
pub struct InMemoryTripRepository {
    trips: Mutex<Vec<Trip>>,
    days: Mutex<Vec<TripDay>>,
    next_id: Mutex<i64>,
}

impl InMemoryTripRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> CoreResult<i64> {
        let mut next_id = self.next_id.lock().map_err(poisoned)?;
        *next_id += 1;
        Ok(*next_id)
    }
}

#[async_trait]
impl TripRepository for InMemoryTripRepository {
    async fn list_trips(&self) -> CoreResult<Vec<Trip>> {
        Ok(self.trips.lock().map_err(poisoned)?.clone())
    }

    async fn get_trip(&self, trip_id: i64) -> CoreResult<Trip> {
        self.trips
            .lock()
            .map_err(poisoned)?
            .iter()
            .find(|t| t.id == trip_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("trip", trip_id))
    }

    async fn create_trip(&self, draft: &TripDraft) -> CoreResult<()> {
        let id = self.allocate()?;
        self.trips.lock().map_err(poisoned)?.push(Trip {
            id,
            title: draft.title.clone(),
            start_date: draft.start_date,
            end_date: draft.end_date,
            region: draft.region.clone(),
            region_lat: draft.latitude,
            region_lng: draft.longitude,
        });
        Ok(())
    }

    async fn update_trip(&self, trip_id: i64, draft: &TripDraft) -> CoreResult<()> {
        let mut trips = self.trips.lock().map_err(poisoned)?;
        let trip = trips
            .iter_mut()
            .find(|t| t.id == trip_id)
            .ok_or_else(|| CoreError::not_found("trip", trip_id))?;
        trip.title = draft.title.clone();
        trip.start_date = draft.start_date;
        trip.end_date = draft.end_date;
        trip.region = draft.region.clone();
        trip.region_lat = draft.latitude;
        trip.region_lng = draft.longitude;
        Ok(())
    }

    async fn delete_trip(&self, trip_id: i64) -> CoreResult<()> {
        let mut trips = self.trips.lock().map_err(poisoned)?;
        let before = trips.len();
        trips.retain(|t| t.id != trip_id);
        if trips.len() == before {
            return Err(CoreError::not_found("trip", trip_id));
        }
        self.days.lock().map_err(poisoned)?.retain(|d| d.trip_id != trip_id);
        Ok(())
    }
}

#[async_trait]
impl TripDayRepository for InMemoryTripRepository {
    async fn list_days(&self, trip_id: i64) -> CoreResult<Vec<TripDay>> {
        Ok(self
            .days
            .lock()
            .map_err(poisoned)?
            .iter()
            .filter(|d| d.trip_id == trip_id)
            .cloned()
            .collect())
    }

    async fn create_day(&self, trip_id: i64, day: &DayRequest) -> CoreResult<TripDay> {
        let id = self.allocate()?;
        let mut days = self.days.lock().map_err(poisoned)?;
        if days
            .iter()
            .any(|d| d.trip_id == trip_id && (d.day == day.day || d.date == day.date))
        {
            return Err(CoreError::Validation(format!("day {} already exists", day.day)));
        }
        let created = TripDay {
            id,
            day: day.day,
            date: day.date,
            trip_id,
        };
        days.push(created.clone());
        Ok(created)
    }

    async fn delete_day(&self, trip_id: i64, day_id: i64) -> CoreResult<()> {
        let mut days = self.days.lock().map_err(poisoned)?;
        let before = days.len();
        days.retain(|d| !(d.trip_id == trip_id && d.id == day_id));
        if days.len() == before {
            return Err(CoreError::not_found("day", day_id));
        }
        Ok(())
    }
}
