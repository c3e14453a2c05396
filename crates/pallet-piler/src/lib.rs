//! # Pallet Piler
//!
//! Pallet loading optimization: place boxes onto as few pallets as possible
//! while respecting pallet dimensions and weight limits, fragile items,
//! base support and load-bearing limits.
//!
//! ## Quick Start
//!
//! ```rust
//! use pallet_piler::pack::{format, Item, PalletPacker, PalletSpec};
//! use pallet_piler::core::PackConfig;
//!
//! let items = vec![
//!     Item::new("Heavy", 45.0, 45.0, 20.0, 100.0).with_quantity(4),
//!     Item::new("Flat", 60.0, 60.0, 5.0, 20.0),
//! ];
//! let pallet = PalletSpec::new(120.0, 100.0, 150.0, 1000.0);
//!
//! let packer = PalletPacker::new(PackConfig::default());
//! let session = packer.pack(&items, &pallet)?;
//! let report = format(&session);
//! assert_eq!(report.summary.items_placed, 5);
//! # Ok::<(), pallet_piler::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Serialization support for items, pallets, configuration and reports

/// Geometry kernel, configuration and shared abstractions.
pub use pallet_piler_core as core;

/// Loading engine, session and report formatting.
pub use pallet_piler_pack as pack;

// Re-export commonly used types at root level
pub use pallet_piler_core::{Error, PackConfig, Result, Solver};
pub use pallet_piler_pack::{format, Item, PalletPacker, PalletSpec, Report};
