//! Pure visit-order arithmetic on a single day's place list.
//!
//! Every function expects its input sorted by `visit_order` and leaves the
//! list dense (`1..=N`) on success.

use tripmate_core::{CoreError, CoreResult};
use tripmate_shared::TripPlace;

/// Sorts by visit order, breaking ties by id so the result is stable across fetches.
pub fn sort(places: &mut [TripPlace]) {
    places.sort_by(|a, b| a.visit_order.cmp(&b.visit_order).then(a.id.cmp(&b.id)));
}

pub fn is_dense(places: &[TripPlace]) -> bool {
    let mut orders: Vec<u32> = places.iter().map(|p| p.visit_order).collect();
    orders.sort_unstable();
    orders.iter().enumerate().all(|(i, order)| *order == i as u32 + 1)
}

/// Rewrites every visit order from the current list position.
pub fn renumber(places: &mut [TripPlace]) {
    for (i, place) in places.iter_mut().enumerate() {
        place.visit_order = i as u32 + 1;
    }
}

fn position(places: &[TripPlace], place_id: i64) -> CoreResult<usize> {
    places
        .iter()
        .position(|p| p.id == place_id)
        .ok_or_else(|| CoreError::not_found("place", place_id))
}

/// Checks a move without touching the list. Returns the place's current 1-based position.
pub fn check_move(places: &[TripPlace], place_id: i64, new_order: u32) -> CoreResult<u32> {
    let idx = position(places, place_id)?;
    let max = places.len() as u32;
    if new_order < 1 || new_order > max {
        return Err(CoreError::OutOfRange {
            requested: new_order,
            max,
        });
    }
    Ok(idx as u32 + 1)
}

/// Moves `place_id` to `new_order`; places in between shift by one.
/// Returns the place's previous position.
pub fn apply_move(places: &mut Vec<TripPlace>, place_id: i64, new_order: u32) -> CoreResult<u32> {
    let old_order = check_move(places, place_id, new_order)?;
    let place = places.remove(old_order as usize - 1);
    places.insert(new_order as usize - 1, place);
    renumber(places);
    Ok(old_order)
}

/// Removes `place_id` and closes the gap behind it.
pub fn apply_removal(places: &mut Vec<TripPlace>, place_id: i64) -> CoreResult<TripPlace> {
    let idx = position(places, place_id)?;
    let removed = places.remove(idx);
    renumber(places);
    Ok(removed)
}

/// Visit-order writes needed to bring `remote` in line with `desired`,
/// as `(place id, visit order)` pairs.
pub fn patches(remote: &[TripPlace], desired: &[TripPlace]) -> Vec<(i64, u32)> {
    desired
        .iter()
        .filter(|want| {
            remote
                .iter()
                .find(|have| have.id == want.id)
                .map_or(false, |have| have.visit_order != want.visit_order)
        })
        .map(|want| (want.id, want.visit_order))
        .collect()
}
