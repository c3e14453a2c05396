//! Placement of one unit on one pallet.

use crate::item::{Item, Orientation};
use nalgebra::Vector3;
use pallet_piler_core::{Box3, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Assignment of one item to a location and orientation on a pallet.
///
/// The weight is copied from the item so that reports can be built from the
/// session alone.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Placement {
    item_id: String,
    pallet_index: usize,
    orientation: Orientation,
    bounds: Box3,
    weight: f64,
}

impl Placement {
    /// Places `item` with its minimum corner at `position` (local coordinates).
    pub fn new(
        item: &Item,
        pallet_index: usize,
        position: Vector3<f64>,
        orientation: Orientation,
    ) -> Result<Self> {
        let bounds = Box3::new(position, item.dimensions_for(orientation))?;
        Ok(Self {
            item_id: item.id().to_string(),
            pallet_index,
            orientation,
            bounds,
            weight: item.weight(),
        })
    }

    /// Returns the item identifier.
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Returns the pallet index.
    pub fn pallet_index(&self) -> usize {
        self.pallet_index
    }

    /// Returns the minimum corner in local pallet coordinates.
    pub fn position(&self) -> Vector3<f64> {
        self.bounds.min()
    }

    /// Returns the oriented extents along x, y and z.
    pub fn extents(&self) -> Vector3<f64> {
        self.bounds.extents()
    }

    /// Returns the chosen orientation.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Returns the occupied box.
    pub fn bounds(&self) -> &Box3 {
        &self.bounds
    }

    /// Returns the weight of the placed unit.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns the occupied volume.
    pub fn volume(&self) -> f64 {
        self.bounds.volume()
    }

    pub(crate) fn set_pallet_index(&mut self, index: usize) {
        self.pallet_index = index;
    }
}
