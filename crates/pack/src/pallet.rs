//! Pallet specification.

use nalgebra::Vector3;
use pallet_piler_core::{Box3, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The container definition shared by every pallet of a job.
///
/// The engine works in local coordinates with the pallet floor at z = 0 and
/// the corner at the origin; `origin` is only added when reporting.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PalletSpec {
    /// Base length (x).
    length: f64,

    /// Base width (y).
    width: f64,

    /// Maximum stack height (z).
    max_height: f64,

    /// Maximum total load weight.
    max_weight: f64,

    /// Base reference corner.
    #[cfg_attr(feature = "serde", serde(default = "default_origin"))]
    origin: Vector3<f64>,
}

#[cfg(feature = "serde")]
fn default_origin() -> Vector3<f64> {
    Vector3::zeros()
}

impl PalletSpec {
    /// Creates a pallet with its reference corner at the origin.
    pub fn new(length: f64, width: f64, max_height: f64, max_weight: f64) -> Self {
        Self {
            length,
            width,
            max_height,
            max_weight,
            origin: Vector3::zeros(),
        }
    }

    /// Sets the base reference corner.
    pub fn with_origin(mut self, origin: Vector3<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Returns the base length.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Returns the base width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Returns the maximum stack height.
    pub fn max_height(&self) -> f64 {
        self.max_height
    }

    /// Returns the maximum total weight.
    pub fn max_weight(&self) -> f64 {
        self.max_weight
    }

    /// Returns the base reference corner.
    pub fn origin(&self) -> &Vector3<f64> {
        &self.origin
    }

    /// Returns the loadable volume.
    pub fn volume(&self) -> f64 {
        self.length * self.width * self.max_height
    }

    /// Returns the loadable space in local coordinates.
    pub fn bounds(&self) -> Result<Box3> {
        Box3::from_corner(0.0, 0.0, 0.0, self.length, self.width, self.max_height)
    }

    /// Validates that every bound is positive and the origin is finite.
    pub fn validate(&self) -> Result<()> {
        let bounds = [
            ("length", self.length),
            ("width", self.width),
            ("max_height", self.max_height),
            ("max_weight", self.max_weight),
        ];
        for (field, value) in bounds {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::non_positive("pallet", field, value));
            }
        }
        if !self.origin.iter().all(|c| c.is_finite()) {
            return Err(Error::InvalidGeometry {
                subject: "pallet".into(),
                field: "origin",
                reason: "must be finite".into(),
            });
        }
        Ok(())
    }
}
