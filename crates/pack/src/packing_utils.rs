//! Shared utilities for the constructive, improvement and exhaustive phases.
//!
//! - [`order_units`] / [`sort_units`]: priority order of the units before construction
//! - [`Score`]: the packing fitness every phase compares sessions with
//! - [`RejectionTracker`]: keeps the furthest rejection seen for an item
//! - [`search_pallet`]: bottom-left-fill scan of one pallet's candidate points

use crate::extreme_point::ExtremePointSet;
use crate::feasibility::{check_placement, Feasibility, Rejection};
use crate::item::{Item, ItemCatalog};
use crate::placement::Placement;
use crate::session::PalletSession;
use pallet_piler_core::OrderingKey;
use std::cmp::Ordering;

/// Orders catalog units by `key`.
///
/// Ties are broken by descending volume, then descending weight, then
/// ascending identifier. [`OrderingKey::Input`] keeps the submission order.
pub fn order_units(catalog: &ItemCatalog, key: OrderingKey) -> Vec<&Item> {
    let mut units: Vec<&Item> = catalog.units().iter().collect();
    sort_units(&mut units, key);
    units
}

/// Sorts units in place with the same rules as [`order_units`].
pub fn sort_units(units: &mut [&Item], key: OrderingKey) {
    if key == OrderingKey::Input {
        return;
    }
    let primary = |item: &Item| match key {
        OrderingKey::VolumeDesc | OrderingKey::Input => item.volume(),
        OrderingKey::WeightDesc => item.weight(),
        OrderingKey::FootprintDesc => item.footprint_area(),
        OrderingKey::HeightDesc => item.height(),
    };
    units.sort_by(|a, b| {
        desc(primary(a), primary(b))
            .then_with(|| desc(a.volume(), b.volume()))
            .then_with(|| desc(a.weight(), b.weight()))
            .then_with(|| a.id().cmp(b.id()))
    });
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Packing fitness of a session, compared lexicographically.
///
/// `slack` is the placed volume minus the volume of every pallet in use, so
/// placing more and opening fewer pallets both raise it. `balance` is the sum
/// of squared volume utilizations, which rewards concentrating load on fewer,
/// fuller pallets when `slack` is equal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Placed volume minus pallet volume times pallets used.
    pub slack: f64,
    /// Sum of squared per-pallet volume utilization.
    pub balance: f64,
}

impl Score {
    /// Scores a session. Empty pallets do not count as used.
    pub fn of(session: &PalletSession) -> Self {
        let capacity = session.pallet_spec().volume();
        let used = session.pallets().iter().filter(|p| !p.is_empty()).count();
        let balance = session
            .pallets()
            .iter()
            .map(|p| (p.volume() / capacity).powi(2))
            .sum();
        Self {
            slack: session.placed_volume() - capacity * used as f64,
            balance,
        }
    }

    /// Returns true if `self` is strictly better than `other`.
    pub fn better_than(&self, other: &Score) -> bool {
        let tol = 1e-9 * self.slack.abs().max(other.slack.abs()).max(1.0);
        if self.slack > other.slack + tol {
            return true;
        }
        if self.slack < other.slack - tol {
            return false;
        }
        self.balance > other.balance + 1e-12
    }
}

/// Keeps the rejection from the furthest check reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectionTracker {
    deepest: Option<Rejection>,
}

impl RejectionTracker {
    /// Records a rejection.
    pub fn record(&mut self, rejection: Rejection) {
        match self.deepest {
            Some(current) if current.stage() >= rejection.stage() => {}
            _ => self.deepest = Some(rejection),
        }
    }

    /// Returns the furthest rejection seen, if any.
    pub fn deepest(&self) -> Option<Rejection> {
        self.deepest
    }

    /// Returns the furthest rejection, or `OutOfBounds` when no candidate
    /// position was left to try.
    pub fn reason(&self) -> Rejection {
        self.deepest.unwrap_or(Rejection::OutOfBounds)
    }
}

/// Scans the candidate points of one pallet for the first feasible position.
///
/// Points are visited in (z, y, x) order and orientations in the item's
/// preference order, so the first hit has the lowest placement cost. The
/// pallet may be the next, not yet opened one.
pub fn search_pallet(
    session: &PalletSession,
    points: &ExtremePointSet,
    item: &Item,
    pallet_index: usize,
    catalog: &ItemCatalog,
    tracker: &mut RejectionTracker,
) -> Option<Placement> {
    let orientations = item.allowed_orientations();
    for point in points.points() {
        for &orientation in &orientations {
            let Ok(candidate) = Placement::new(item, pallet_index, *point, orientation) else {
                continue;
            };
            match check_placement(&candidate, session, catalog) {
                Feasibility::Feasible => return Some(candidate),
                Feasibility::Rejected(r) => tracker.record(r),
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feasibility::StackingRules;
    use crate::pallet::PalletSpec;

    #[test]
    fn test_order_units_default() {
        let catalog = ItemCatalog::new(&[
            Item::new("small", 10.0, 10.0, 10.0, 5.0),
            Item::new("b", 20.0, 20.0, 20.0, 5.0),
            Item::new("a", 20.0, 20.0, 20.0, 5.0),
            Item::new("heavy", 20.0, 20.0, 20.0, 9.0),
        ])
        .unwrap();
        let ids: Vec<&str> = order_units(&catalog, OrderingKey::VolumeDesc)
            .into_iter()
            .map(Item::id)
            .collect();
        assert_eq!(ids, vec!["heavy", "a", "b", "small"]);

        let ids: Vec<&str> = order_units(&catalog, OrderingKey::Input)
            .into_iter()
            .map(Item::id)
            .collect();
        assert_eq!(ids, vec!["small", "b", "a", "heavy"]);
    }

    #[test]
    fn test_order_units_by_height() {
        let catalog = ItemCatalog::new(&[
            Item::new("flat", 60.0, 60.0, 5.0, 20.0),
            Item::new("tall", 10.0, 10.0, 60.0, 15.0),
        ])
        .unwrap();
        let first = order_units(&catalog, OrderingKey::HeightDesc)[0].id();
        assert_eq!(first, "tall");
        let first = order_units(&catalog, OrderingKey::FootprintDesc)[0].id();
        assert_eq!(first, "flat");
    }

    #[test]
    fn test_rejection_tracker_keeps_deepest() {
        let mut tracker = RejectionTracker::default();
        assert_eq!(tracker.reason(), Rejection::OutOfBounds);
        tracker.record(Rejection::Collision);
        tracker.record(Rejection::InsufficientSupport);
        tracker.record(Rejection::WeightExceeded);
        assert_eq!(tracker.deepest(), Some(Rejection::InsufficientSupport));
    }

    #[test]
    fn test_score_prefers_fewer_pallets() {
        let catalog = ItemCatalog::new(&[
            Item::new("A", 50.0, 50.0, 50.0, 1.0),
            Item::new("B", 50.0, 50.0, 50.0, 1.0),
        ])
        .unwrap();
        let spec = PalletSpec::new(100.0, 100.0, 100.0, 100.0);
        let mut one = PalletSession::for_catalog(spec.clone(), StackingRules::default(), &catalog);
        let mut two = one.clone();

        one.open_pallet().unwrap();
        let points = ExtremePointSet::new(&spec);
        let mut tracker = RejectionTracker::default();
        for id in ["A", "B"] {
            let item = catalog.require(id).unwrap();
            let points = ExtremePointSet::from_placements(&spec, one.pallet(0).unwrap().placements());
            let p = search_pallet(&one, &points, item, 0, &catalog, &mut tracker).unwrap();
            one.place(0, p, &catalog).unwrap();
        }

        for (index, id) in ["A", "B"].into_iter().enumerate() {
            two.open_pallet().unwrap();
            let item = catalog.require(id).unwrap();
            let p = search_pallet(&two, &points, item, index, &catalog, &mut tracker).unwrap();
            two.place(index, p, &catalog).unwrap();
        }

        assert!(Score::of(&one).better_than(&Score::of(&two)));
        assert!(!Score::of(&two).better_than(&Score::of(&one)));
        assert!(!Score::of(&one).better_than(&Score::of(&one)));
    }
}
