//! # Pallet Piler Core
//!
//! Core types shared by the pallet loading engine.
//!
//! ## Core Components
//!
//! - **Geometry kernel**: [`Box3`], [`overlaps`], [`is_contained`], [`support_area`]
//! - **Errors**: [`Error`] and the [`Result`] alias
//! - **Configuration**: [`PackConfig`], [`OrderingKey`], [`ImprovementBudget`]
//! - **Run control**: [`Deadline`], [`ProgressInfo`], [`ProgressCallback`]
//! - **Solver trait**: [`Solver`] - common interface for packing engines
//!
//! ## Configuration
//!
//! ```rust
//! use pallet_piler_core::{ImprovementBudget, OrderingKey, PackConfig};
//!
//! let config = PackConfig::new()
//!     .with_min_support_fraction(0.8)
//!     .with_ordering_key(OrderingKey::WeightDesc)
//!     .with_improvement(ImprovementBudget::iterations(10))
//!     .with_time_limit(2_000);
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod error;
pub mod geometry;
pub mod solver;

// Re-exports
pub use error::{Error, Result};
pub use geometry::{is_contained, overlaps, support_area, Box3, EPSILON};
pub use solver::{
    Deadline, ImprovementBudget, OrderingKey, PackConfig, ProgressCallback, ProgressInfo, Solver,
    EXHAUSTIVE_ITEM_CAP,
};
