//! # Pallet Piler Pack
//!
//! 3D pallet loading with physical stacking constraints.
//!
//! Items are placed one by one at candidate corner points using a
//! bottom-left-fill rule, every candidate is checked for bounds, overlap,
//! pallet weight, fragile items, base support and load capacity, and a local
//! improvement pass then tries to consolidate the plan.
//!
//! ## Quick Start
//!
//! ```rust
//! use pallet_piler_pack::{format, pack, Item, PalletSpec};
//! use pallet_piler_core::PackConfig;
//!
//! let items = vec![Item::new("crate", 50.0, 50.0, 50.0, 100.0).with_quantity(3)];
//! let pallet = PalletSpec::new(100.0, 100.0, 150.0, 500.0);
//!
//! let session = pack(&items, &pallet, &PackConfig::default()).unwrap();
//! let report = format(&session);
//! assert_eq!(report.summary.items_placed, 3);
//! ```

mod exhaustive;
pub mod extreme_point;
pub mod feasibility;
mod improve;
pub mod item;
pub mod packer;
pub mod packing_utils;
pub mod pallet;
pub mod placement;
pub mod report;
pub mod session;

pub use extreme_point::ExtremePointSet;
pub use feasibility::{check_in_context, check_placement, Feasibility, Rejection, StackingRules};
pub use item::{Item, ItemCatalog, Orientation, OrientationConstraint, StackClass};
pub use packer::{pack, PalletPacker};
pub use packing_utils::{order_units, sort_units, Score};
pub use pallet::PalletSpec;
pub use placement::Placement;
pub use report::{format, JobSummary, PalletReport, PlacementReport, Report, UnplacedReport};
pub use session::{
    Capacity, Edit, PalletLoad, PalletSession, SealedSession, UnplacedItem, UnplacedReason,
};
