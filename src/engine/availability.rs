use chrono::NaiveDate;

use crate::model::SlotAvailability;
use crate::slots::{SlotGrid, SlotTime};

// ── Availability Algorithm ────────────────────────────────────────

/// Split the grid into free and booked slots for one date.
///
/// `occupied` holds the times of every non-cancelled appointment on `date`,
/// ascending. Both outputs keep grid order, are disjoint, and together cover
/// the grid exactly. Occupied times that are not on the grid (left over from
/// a different grid configuration) appear in neither list.
pub fn available_slots(grid: &SlotGrid, date: NaiveDate, occupied: &[SlotTime]) -> SlotAvailability {
    let mut available = Vec::with_capacity(grid.len());
    let mut booked = Vec::new();

    for &slot in grid.slots() {
        if occupied.binary_search(&slot).is_ok() {
            booked.push(slot);
        } else {
            available.push(slot);
        }
    }

    let stray = occupied.iter().filter(|t| !grid.contains(**t)).count();
    if stray > 0 {
        tracing::debug!(%date, stray, "occupied times outside the slot grid");
    }

    SlotAvailability {
        date,
        available,
        booked,
    }
}
