use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use tripmate_core::{CoreError, CoreResult, TripPlaceRepository, Validate};
use tripmate_shared::{PlaceDraft, TripPlace};

use crate::ordering;

/// Keeps each day's places densely ordered while the store underneath
/// may only patch one record per write.
///
/// Writes are two-phase: the change is applied to the local view first,
/// then sent to the store. A failed write replaces the local view with a
/// fresh fetch before the error is returned.
pub struct ItineraryService {
    repo: Arc<dyn TripPlaceRepository>,
    days: RwLock<HashMap<i64, Vec<TripPlace>>>,
}

impl ItineraryService {
    pub fn new(repo: Arc<dyn TripPlaceRepository>) -> Self {
        Self {
            repo,
            days: RwLock::new(HashMap::new()),
        }
    }

    /// Current local view of a day, if it has been loaded.
    pub async fn cached(&self, day_id: i64) -> Option<Vec<TripPlace>> {
        self.days.read().await.get(&day_id).cloned()
    }

    /// Authoritative places of a day, sorted by visit order.
    pub async fn list(&self, day_id: i64) -> CoreResult<Vec<TripPlace>> {
        let places = self.fetch(day_id).await?;
        self.store_view(day_id, places.clone()).await;
        Ok(places)
    }

    /// Adds a place at the end of the day.
    pub async fn append(&self, day_id: i64, draft: PlaceDraft) -> CoreResult<TripPlace> {
        draft.validate()?;
        let current = self.fetch(day_id).await?;
        let visit_order = current.len() as u32 + 1;
        let request = draft
            .to_request(visit_order)
            .ok_or_else(|| CoreError::Validation("coordinate is required".to_string()))?;

        let created = match self.repo.create_place(day_id, &request).await {
            Ok(created) => created,
            Err(e) => return Err(self.resync(day_id, e).await),
        };
        info!(
            "Appended place {} to day {} at visit order {}",
            created.id, day_id, visit_order
        );

        let mut view = current;
        view.push(created.clone());
        self.store_view(day_id, view).await;
        self.refresh(day_id).await;
        Ok(created)
    }

    /// Moves a place to `new_order`, shifting the places in between.
    pub async fn reorder(
        &self,
        day_id: i64,
        place_id: i64,
        new_order: u32,
    ) -> CoreResult<Vec<TripPlace>> {
        let current = self.fetch(day_id).await?;
        let mut desired = current.clone();
        let old_order = ordering::apply_move(&mut desired, place_id, new_order)?;
        if old_order == new_order {
            if ordering::is_dense(&current) {
                self.store_view(day_id, current.clone()).await;
                return Ok(current);
            }
            // Nothing moves, but the stored orders have gaps to close.
            self.store_view(day_id, desired.clone()).await;
            return self.settle(day_id, &desired).await;
        }

        self.store_view(day_id, desired.clone()).await;
        if let Err(e) = self.repo.update_visit_order(day_id, place_id, new_order).await {
            return Err(self.resync(day_id, e).await);
        }
        info!(
            "Moved place {} on day {} from {} to {}",
            place_id, day_id, old_order, new_order
        );
        self.settle(day_id, &desired).await
    }

    /// Deletes a place and closes the gap it leaves.
    pub async fn remove(&self, day_id: i64, place_id: i64) -> CoreResult<Vec<TripPlace>> {
        let mut desired = self.fetch(day_id).await?;
        ordering::apply_removal(&mut desired, place_id)?;

        self.store_view(day_id, desired.clone()).await;
        if let Err(e) = self.repo.delete_place(day_id, place_id).await {
            return Err(self.resync(day_id, e).await);
        }
        info!("Removed place {} from day {}", place_id, day_id);
        self.settle(day_id, &desired).await
    }

    /// Edits name, address, coordinate, memo and visit time. The visit order is kept.
    pub async fn update_details(
        &self,
        day_id: i64,
        place_id: i64,
        draft: PlaceDraft,
    ) -> CoreResult<TripPlace> {
        draft.validate()?;
        let mut view = self.fetch(day_id).await?;
        let idx = view
            .iter()
            .position(|p| p.id == place_id)
            .ok_or_else(|| CoreError::not_found("place", place_id))?;
        let request = draft
            .to_request(view[idx].visit_order)
            .ok_or_else(|| CoreError::Validation("coordinate is required".to_string()))?;

        let local = &mut view[idx];
        local.place_name = request.place_name.clone();
        local.address = request.address.clone();
        local.latitude = request.latitude;
        local.longitude = request.longitude;
        local.memo = request.memo.clone();
        local.place_id = request.place_id.clone();
        local.visit_time = Some(request.visit_time);
        self.store_view(day_id, view.clone()).await;

        match self.repo.update_place(day_id, place_id, &request).await {
            Ok(updated) => {
                view[idx] = updated.clone();
                self.store_view(day_id, view).await;
                Ok(updated)
            }
            Err(e) => Err(self.resync(day_id, e).await),
        }
    }

    /// Brings the store in line with `desired` after a successful write.
    async fn settle(&self, day_id: i64, desired: &[TripPlace]) -> CoreResult<Vec<TripPlace>> {
        let remote = match self.fetch(day_id).await {
            Ok(remote) => remote,
            Err(e) => return Err(self.resync(day_id, e).await),
        };
        let pending = ordering::patches(&remote, desired);
        if pending.is_empty() {
            self.store_view(day_id, remote.clone()).await;
            return Ok(remote);
        }

        debug!("Day {} needs {} visit order patches", day_id, pending.len());
        for (place_id, visit_order) in pending {
            if let Err(e) = self.repo.update_visit_order(day_id, place_id, visit_order).await {
                return Err(self.resync(day_id, e).await);
            }
        }

        let settled = match self.fetch(day_id).await {
            Ok(settled) => settled,
            Err(e) => return Err(self.resync(day_id, e).await),
        };
        if !ordering::is_dense(&settled) {
            warn!("Day {} is still not densely ordered after repair", day_id);
        }
        self.store_view(day_id, settled.clone()).await;
        Ok(settled)
    }

    /// Sorted fetch, retried once on a transport failure.
    async fn fetch(&self, day_id: i64) -> CoreResult<Vec<TripPlace>> {
        let mut places = match self.repo.list_places(day_id).await {
            Ok(places) => places,
            Err(e) if e.is_retryable() => {
                warn!("Retrying places of day {} after: {}", day_id, e);
                self.repo.list_places(day_id).await?
            }
            Err(e) => return Err(e),
        };
        ordering::sort(&mut places);
        Ok(places)
    }

    /// Replaces the local view with the store's and hands back `cause`.
    async fn resync(&self, day_id: i64, cause: CoreError) -> CoreError {
        warn!("Write to day {} failed, resyncing: {}", day_id, cause);
        match self.fetch(day_id).await {
            Ok(places) => self.store_view(day_id, places).await,
            Err(e) => {
                warn!("Resync of day {} failed: {}", day_id, e);
                self.days.write().await.remove(&day_id);
            }
        }
        cause
    }

    async fn refresh(&self, day_id: i64) {
        match self.fetch(day_id).await {
            Ok(places) => self.store_view(day_id, places).await,
            Err(e) => debug!("Refresh of day {} skipped: {}", day_id, e),
        }
    }

    async fn store_view(&self, day_id: i64, places: Vec<TripPlace>) {
        self.days.write().await.insert(day_id, places);
    }
}
