//! Geometry kernel: axis-aligned boxes and the tests the packer is built on.
//!
//! All functions here are pure. Boxes are described by their minimum corner and
//! their extents; a box can only be constructed with non-negative, finite values,
//! so the predicates themselves never fail.
//!
//! Faces that merely touch are not considered overlapping. Comparisons use
//! [`EPSILON`] so that boxes computed by adding extents to positions still line
//! up exactly where they should.

use crate::{Error, Result};
use nalgebra::Vector3;
use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance used for all geometric comparisons.
pub const EPSILON: f64 = 1e-9;

/// An axis-aligned box given by its minimum corner and its extents.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Box3 {
    min: Vector3<f64>,
    extents: Vector3<f64>,
}

impl Box3 {
    /// Creates a box from its minimum corner and extents.
    ///
    /// Fails with [`Error::InvalidGeometry`] if any extent is negative or any
    /// coordinate is not finite.
    pub fn new(min: Vector3<f64>, extents: Vector3<f64>) -> Result<Self> {
        for (axis, field) in ["extent.x", "extent.y", "extent.z"].into_iter().enumerate() {
            let value = extents[axis];
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidGeometry {
                    subject: "box".into(),
                    field,
                    reason: format!("must be non-negative and finite, got {value}"),
                });
            }
        }
        for (axis, field) in ["min.x", "min.y", "min.z"].into_iter().enumerate() {
            if !min[axis].is_finite() {
                return Err(Error::InvalidGeometry {
                    subject: "box".into(),
                    field,
                    reason: format!("must be finite, got {}", min[axis]),
                });
            }
        }
        Ok(Self { min, extents })
    }

    /// Creates a box from scalar corner coordinates and extents.
    pub fn from_corner(x: f64, y: f64, z: f64, dx: f64, dy: f64, dz: f64) -> Result<Self> {
        Self::new(Vector3::new(x, y, z), Vector3::new(dx, dy, dz))
    }

    /// Returns the minimum corner.
    pub fn min(&self) -> Vector3<f64> {
        self.min
    }

    /// Returns the extents.
    pub fn extents(&self) -> Vector3<f64> {
        self.extents
    }

    /// Returns the maximum corner.
    pub fn max(&self) -> Vector3<f64> {
        self.min + self.extents
    }

    /// Returns the z coordinate of the bottom face.
    pub fn bottom(&self) -> f64 {
        self.min.z
    }

    /// Returns the z coordinate of the top face.
    pub fn top(&self) -> f64 {
        self.min.z + self.extents.z
    }

    /// Returns the volume.
    pub fn volume(&self) -> f64 {
        self.extents.x * self.extents.y * self.extents.z
    }

    /// Returns the area of the base footprint.
    pub fn footprint_area(&self) -> f64 {
        self.extents.x * self.extents.y
    }

    /// Returns the geometric center.
    pub fn center(&self) -> Vector3<f64> {
        self.min + self.extents / 2.0
    }

    /// Returns true if the two boxes share interior volume.
    pub fn overlaps(&self, other: &Box3) -> bool {
        (0..3).all(|axis| self.axis_overlap(other, axis) > EPSILON)
    }

    /// Returns true if this box lies entirely within `bounds`.
    pub fn is_contained(&self, bounds: &Box3) -> bool {
        let max = self.max();
        let bounds_max = bounds.max();
        (0..3).all(|axis| {
            self.min[axis] >= bounds.min[axis] - EPSILON && max[axis] <= bounds_max[axis] + EPSILON
        })
    }

    /// Returns the overlap area of the two footprints projected on the floor.
    pub fn footprint_overlap(&self, other: &Box3) -> f64 {
        self.axis_overlap(other, 0) * self.axis_overlap(other, 1)
    }

    /// Returns true if this box sits directly on top of `lower`.
    ///
    /// The bottom face has to be level with the top face of `lower` and the
    /// footprints have to share a positive area.
    pub fn rests_on(&self, lower: &Box3) -> bool {
        (lower.top() - self.bottom()).abs() <= EPSILON && self.footprint_overlap(lower) > EPSILON
    }

    /// Returns true if `point` lies in the half-open box `[min, max)`.
    pub fn contains_point(&self, point: &Vector3<f64>) -> bool {
        let max = self.max();
        (0..3).all(|axis| point[axis] > self.min[axis] - EPSILON && point[axis] < max[axis] - EPSILON)
    }

    fn axis_overlap(&self, other: &Box3, axis: usize) -> f64 {
        let lo = self.min[axis].max(other.min[axis]);
        let hi = (self.min[axis] + self.extents[axis]).min(other.min[axis] + other.extents[axis]);
        (hi - lo).max(0.0)
    }
}

/// Returns true iff the two boxes share interior volume.
pub fn overlaps(a: &Box3, b: &Box3) -> bool {
    a.overlaps(b)
}

/// Returns true iff `b` lies fully within `bounds` on all three axes.
pub fn is_contained(b: &Box3, bounds: &Box3) -> bool {
    b.is_contained(bounds)
}

/// Returns the fraction of the base of `target` that is supported.
///
/// A box whose bottom is at height 0 stands on the floor and is fully
/// supported. Otherwise the supported area is the union of the tops of those
/// `below` boxes that are level with the bottom of `target`, clipped to its
/// footprint. The result is in `[0, 1]`.
pub fn support_area(target: &Box3, below: &[Box3]) -> f64 {
    if target.bottom().abs() <= EPSILON {
        return 1.0;
    }
    let base = target.footprint_area();
    if base <= EPSILON {
        return 0.0;
    }

    let t_min = target.min();
    let t_max = target.max();
    let rects: Vec<[f64; 4]> = below
        .iter()
        .filter(|b| (b.top() - target.bottom()).abs() <= EPSILON)
        .filter_map(|b| {
            let b_min = b.min();
            let b_max = b.max();
            let rect = [
                t_min.x.max(b_min.x),
                t_min.y.max(b_min.y),
                t_max.x.min(b_max.x),
                t_max.y.min(b_max.y),
            ];
            (rect[2] - rect[0] > EPSILON && rect[3] - rect[1] > EPSILON).then_some(rect)
        })
        .collect();

    if rects.is_empty() {
        return 0.0;
    }

    (union_area(&rects) / base).clamp(0.0, 1.0)
}

/// Area of the union of rectangles `[min_x, min_y, max_x, max_y]`, computed on
/// the grid induced by their edges.
fn union_area(rects: &[[f64; 4]]) -> f64 {
    let xs = sorted_edges(rects.iter().flat_map(|r| [r[0], r[2]]));
    let ys = sorted_edges(rects.iter().flat_map(|r| [r[1], r[3]]));

    let mut area = 0.0;
    for xw in xs.windows(2) {
        let cx = (xw[0] + xw[1]) / 2.0;
        for yw in ys.windows(2) {
            let cy = (yw[0] + yw[1]) / 2.0;
            let covered = rects
                .iter()
                .any(|r| cx > r[0] && cx < r[2] && cy > r[1] && cy < r[3]);
            if covered {
                area += (xw[1] - xw[0]) * (yw[1] - yw[0]);
            }
        }
    }
    area
}

fn sorted_edges(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut edges: Vec<f64> = values.collect();
    edges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    edges.dedup_by(|a, b| (*a - *b).abs() <= EPSILON);
    edges
}
