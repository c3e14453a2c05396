//! Candidate placement points for one pallet.
//!
//! Extreme points are positions where a new box could sit touching at least
//! two surfaces (pallet walls, the floor or other boxes). The set starts with
//! the floor origin. Every placed box contributes the points at its top, front
//! and right corners, and the front and right points are also projected down
//! onto the highest surface beneath them. Points that fall outside the pallet
//! or inside a placed box are dropped.
//!
//! Points are kept sorted by z, then y, then x, so scanning them in order
//! yields the bottom-left-fill preference.
//!
//! # References
//!
//! - Crainic, T. G., Perboli, G., & Tadei, R. (2008). Extreme point-based heuristics
//!   for three-dimensional bin packing.

use crate::pallet::PalletSpec;
use crate::placement::Placement;
use nalgebra::Vector3;
use pallet_piler_core::{Box3, EPSILON};
use std::cmp::Ordering;

/// Sorted, de-duplicated candidate points of one pallet, in local coordinates.
#[derive(Debug, Clone)]
pub struct ExtremePointSet {
    points: Vec<Vector3<f64>>,
    placed: Vec<Box3>,
    container: Vector3<f64>,
}

impl ExtremePointSet {
    /// Creates the set for an empty pallet: just the floor origin.
    pub fn new(pallet: &PalletSpec) -> Self {
        Self {
            points: vec![Vector3::zeros()],
            placed: Vec::new(),
            container: Vector3::new(pallet.length(), pallet.width(), pallet.max_height()),
        }
    }

    /// Rebuilds the set by replaying placements in commit order.
    pub fn from_placements(pallet: &PalletSpec, placements: &[Placement]) -> Self {
        let mut set = Self::new(pallet);
        for p in placements {
            set.insert(*p.bounds());
        }
        set
    }

    /// Returns the points in (z, y, x) order.
    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    /// Returns the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if no point is left.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Records a placed box and updates the points.
    pub fn insert(&mut self, placed: Box3) {
        self.points.retain(|p| !placed.contains_point(p));
        self.placed.push(placed);

        let min = placed.min();
        let max = placed.max();

        let top = Vector3::new(min.x, min.y, max.z);
        let right = Vector3::new(max.x, min.y, min.z);
        let front = Vector3::new(min.x, max.y, min.z);

        self.add_if_valid(top);
        self.add_if_valid(right);
        self.add_if_valid(front);
        if min.z > EPSILON {
            self.add_if_valid(Vector3::new(right.x, right.y, self.surface_below(&right)));
            self.add_if_valid(Vector3::new(front.x, front.y, self.surface_below(&front)));
        }

        self.points.sort_by(compare_zyx);
        self.points
            .dedup_by(|a, b| (*a - *b).iter().all(|d| d.abs() <= EPSILON));
    }

    fn add_if_valid(&mut self, point: Vector3<f64>) {
        let outside = (0..3).any(|axis| point[axis] >= self.container[axis] - EPSILON);
        if outside {
            return;
        }
        if self.placed.iter().any(|b| b.contains_point(&point)) {
            return;
        }
        self.points.push(point);
    }

    /// Height of the highest top face below `point` whose footprint contains it,
    /// or the floor.
    fn surface_below(&self, point: &Vector3<f64>) -> f64 {
        self.placed
            .iter()
            .filter(|b| {
                let min = b.min();
                let max = b.max();
                point.x > min.x - EPSILON
                    && point.x < max.x - EPSILON
                    && point.y > min.y - EPSILON
                    && point.y < max.y - EPSILON
                    && b.top() <= point.z + EPSILON
            })
            .map(Box3::top)
            .fold(0.0, f64::max)
    }
}

fn compare_zyx(a: &Vector3<f64>, b: &Vector3<f64>) -> Ordering {
    a.z.partial_cmp(&b.z)
        .unwrap_or(Ordering::Equal)
        .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
        .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pallet() -> PalletSpec {
        PalletSpec::new(100.0, 100.0, 100.0, 1000.0)
    }

    fn cube(x: f64, y: f64, z: f64, side: f64) -> Box3 {
        Box3::from_corner(x, y, z, side, side, side).unwrap()
    }

    #[test]
    fn test_initial_set_is_origin() {
        let eps = ExtremePointSet::new(&pallet());
        assert_eq!(eps.len(), 1);
        assert_eq!(eps.points()[0], Vector3::zeros());
    }

    #[test]
    fn test_points_after_first_box() {
        let mut eps = ExtremePointSet::new(&pallet());
        eps.insert(cube(0.0, 0.0, 0.0, 40.0));

        // The origin is consumed; right, front and top remain in (z, y, x) order.
        assert_eq!(
            eps.points(),
            &[
                Vector3::new(40.0, 0.0, 0.0),
                Vector3::new(0.0, 40.0, 0.0),
                Vector3::new(0.0, 0.0, 40.0),
            ]
        );
    }

    #[test]
    fn test_points_outside_pallet_are_dropped() {
        let mut eps = ExtremePointSet::new(&pallet());
        eps.insert(Box3::from_corner(0.0, 0.0, 0.0, 100.0, 100.0, 50.0).unwrap());
        assert_eq!(eps.points(), &[Vector3::new(0.0, 0.0, 50.0)]);
    }

    #[test]
    fn test_raised_box_projects_points_down() {
        let mut eps = ExtremePointSet::new(&pallet());
        eps.insert(Box3::from_corner(0.0, 0.0, 0.0, 60.0, 60.0, 20.0).unwrap());
        eps.insert(cube(0.0, 0.0, 20.0, 30.0));

        let points = eps.points();
        // Right corner of the upper box, projected onto the lower box's top.
        assert!(points.contains(&Vector3::new(30.0, 0.0, 20.0)));
        assert!(points.contains(&Vector3::new(0.0, 30.0, 20.0)));
        // Points sit in (z, y, x) order.
        assert!(points
            .windows(2)
            .all(|w| compare_zyx(&w[0], &w[1]) != Ordering::Greater));
    }

    #[test]
    fn test_from_placements_matches_incremental() {
        use crate::item::{Item, Orientation};
        let spec = pallet();
        let a = Item::new("A", 40.0, 40.0, 40.0, 1.0);
        let b = Item::new("B", 40.0, 40.0, 40.0, 1.0);
        let placements = vec![
            Placement::new(&a, 0, Vector3::zeros(), Orientation::Lwh).unwrap(),
            Placement::new(&b, 0, Vector3::new(40.0, 0.0, 0.0), Orientation::Lwh).unwrap(),
        ];

        let mut incremental = ExtremePointSet::new(&spec);
        for p in &placements {
            incremental.insert(*p.bounds());
        }
        let replayed = ExtremePointSet::from_placements(&spec, &placements);
        assert_eq!(incremental.points(), replayed.points());
    }
}
