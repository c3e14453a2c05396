//! Result formatter: turns a finished session into the externally consumed report.
//!
//! Reports contain no timings, so identical jobs produce identical reports.

use crate::item::Orientation;
use crate::session::{PalletSession, UnplacedReason};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One placed item as reported.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlacementReport {
    /// Item identifier.
    pub item_id: String,
    /// Minimum corner, offset by the pallet origin.
    pub position: [f64; 3],
    /// Extents along x, y and z after orientation.
    pub dimensions: [f64; 3],
    /// Chosen orientation.
    pub orientation: Orientation,
    /// Whether the item was turned from its submitted orientation.
    pub rotated: bool,
    /// Weight of the item.
    pub weight: f64,
}

/// Metrics and placements of one pallet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PalletReport {
    /// Pallet index.
    pub index: usize,
    /// Placements in loading order.
    pub placements: Vec<PlacementReport>,
    /// Occupied volume.
    pub occupied_volume: f64,
    /// Total load weight.
    pub total_weight: f64,
    /// Occupied volume over available volume.
    pub volume_utilization: f64,
    /// Load weight over weight limit.
    pub weight_utilization: f64,
    /// Height of the highest top face.
    pub load_height: f64,
    /// Weight-averaged center of the load, offset by the pallet origin.
    pub center_of_gravity: Option<[f64; 3]>,
}

/// An item that was not placed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnplacedReport {
    /// Item identifier.
    pub item_id: String,
    /// Why it was not placed.
    pub reason: UnplacedReason,
}

/// Job-level summary.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JobSummary {
    /// Number of pallets with at least one item.
    pub pallets_used: usize,
    /// Number of placed items.
    pub items_placed: usize,
    /// Number of unplaced items.
    pub items_unplaced: usize,
    /// Occupied volume over the volume of all used pallets.
    pub volume_utilization: f64,
    /// Load weight over the weight limit of all used pallets.
    pub weight_utilization: f64,
    /// True if the job stopped early and the plan is best-effort.
    pub partial: bool,
}

/// The final placement plan.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Report {
    /// Per-pallet placements and metrics.
    pub pallets: Vec<PalletReport>,
    /// Items that were not placed, with reasons.
    pub unplaced: Vec<UnplacedReport>,
    /// Job summary.
    pub summary: JobSummary,
}

/// Formats a session into a report.
///
/// Pallets without placements are skipped. Takes a [`PalletSession`], which a
/// [`SealedSession`](crate::session::SealedSession) dereferences to.
pub fn format(session: &PalletSession) -> Report {
    let spec = session.pallet_spec();
    let origin = spec.origin();
    let offset = |v: nalgebra::Vector3<f64>| [v.x + origin.x, v.y + origin.y, v.z + origin.z];

    let pallets: Vec<PalletReport> = session
        .pallets()
        .iter()
        .filter(|load| !load.is_empty())
        .enumerate()
        .map(|(index, load)| {
            let placements = load
                .placements()
                .iter()
                .map(|p| PlacementReport {
                    item_id: p.item_id().to_string(),
                    position: offset(p.position()),
                    dimensions: [p.extents().x, p.extents().y, p.extents().z],
                    orientation: p.orientation(),
                    rotated: p.orientation().is_rotated(),
                    weight: p.weight(),
                })
                .collect();

            let load_height = load
                .placements()
                .iter()
                .map(|p| p.bounds().top())
                .fold(0.0, f64::max);

            let center_of_gravity = (load.weight() > 0.0).then(|| {
                let moment = load
                    .placements()
                    .iter()
                    .fold(nalgebra::Vector3::<f64>::zeros(), |acc, p| {
                        acc + p.bounds().center() * p.weight()
                    });
                offset(moment / load.weight())
            });

            PalletReport {
                index,
                placements,
                occupied_volume: load.volume(),
                total_weight: load.weight(),
                volume_utilization: load.volume() / spec.volume(),
                weight_utilization: load.weight() / spec.max_weight(),
                load_height,
                center_of_gravity,
            }
        })
        .collect();

    let unplaced: Vec<UnplacedReport> = session
        .unplaced()
        .iter()
        .map(|u| UnplacedReport {
            item_id: u.item_id.clone(),
            reason: u.reason,
        })
        .collect();

    let used = pallets.len();
    let occupied: f64 = pallets.iter().map(|p| p.occupied_volume).sum();
    let weight: f64 = pallets.iter().map(|p| p.total_weight).sum();
    let ratio = |value: f64, capacity: f64| {
        if used == 0 {
            0.0
        } else {
            value / (capacity * used as f64)
        }
    };

    let summary = JobSummary {
        pallets_used: used,
        items_placed: pallets.iter().map(|p| p.placements.len()).sum(),
        items_unplaced: unplaced.len(),
        volume_utilization: ratio(occupied, spec.volume()),
        weight_utilization: ratio(weight, spec.max_weight()),
        partial: session.is_partial(),
    };

    Report {
        pallets,
        unplaced,
        summary,
    }
}

impl Report {
    /// Looks up the placement of an item.
    pub fn placement(&self, item_id: &str) -> Option<(usize, &PlacementReport)> {
        self.pallets.iter().find_map(|pallet| {
            pallet
                .placements
                .iter()
                .find(|p| p.item_id == item_id)
                .map(|p| (pallet.index, p))
        })
    }

    /// Returns true if every item was placed and the job ran to completion.
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty() && !self.summary.partial
    }
}
