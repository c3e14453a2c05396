//! Placement feasibility checker.
//!
//! Decides whether a candidate placement is legal on the current state of a
//! pallet. The checker is stateless: every call is answered from the session
//! and catalog it is given.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. bounds ([`Rejection::OutOfBounds`])
//! 2. overlap ([`Rejection::Collision`])
//! 3. pallet weight ([`Rejection::WeightExceeded`])
//! 4. fragile items ([`Rejection::StackingForbidden`])
//! 5. base support ([`Rejection::InsufficientSupport`])
//! 6. load on top ([`Rejection::LoadCapacityExceeded`])
//! 7. heaviest at the bottom, when enabled ([`Rejection::HeavierOnLighter`])

use crate::item::ItemCatalog;
use crate::pallet::PalletSpec;
use crate::placement::Placement;
use crate::session::PalletSession;
use pallet_piler_core::{support_area, Box3, PackConfig, EPSILON};
use std::collections::VecDeque;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why a candidate placement is not legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Rejection {
    /// The box leaves the pallet footprint or exceeds the stack height.
    OutOfBounds,
    /// The box overlaps an item already on the pallet.
    Collision,
    /// The pallet's weight limit would be exceeded.
    WeightExceeded,
    /// A non-stackable item would carry another item.
    StackingForbidden,
    /// Too little of the base rests on the floor or on items below.
    InsufficientSupport,
    /// An item below would carry more than its maximum load on top.
    LoadCapacityExceeded,
    /// An item would rest on a lighter item.
    HeavierOnLighter,
}

impl Rejection {
    /// Position of the check in evaluation order.
    pub fn stage(self) -> u8 {
        match self {
            Rejection::OutOfBounds => 0,
            Rejection::Collision => 1,
            Rejection::WeightExceeded => 2,
            Rejection::StackingForbidden => 3,
            Rejection::InsufficientSupport => 4,
            Rejection::LoadCapacityExceeded => 5,
            Rejection::HeavierOnLighter => 6,
        }
    }

    /// Stable name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::OutOfBounds => "OutOfBounds",
            Rejection::Collision => "Collision",
            Rejection::WeightExceeded => "WeightExceeded",
            Rejection::StackingForbidden => "StackingForbidden",
            Rejection::InsufficientSupport => "InsufficientSupport",
            Rejection::LoadCapacityExceeded => "LoadCapacityExceeded",
            Rejection::HeavierOnLighter => "HeavierOnLighter",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a feasibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feasibility {
    /// Every check passed.
    Feasible,
    /// The first check that failed.
    Rejected(Rejection),
}

impl Feasibility {
    /// Returns true if the candidate is legal.
    pub fn is_feasible(&self) -> bool {
        matches!(self, Feasibility::Feasible)
    }

    /// Returns the rejection, if any.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Feasibility::Feasible => None,
            Feasibility::Rejected(r) => Some(*r),
        }
    }
}

/// Stacking rules the checker enforces beyond pure geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackingRules {
    /// Minimum supported fraction of a raised item's base.
    pub min_support_fraction: f64,
    /// Reject items resting on lighter items.
    pub forbid_heavier_on_lighter: bool,
}

impl Default for StackingRules {
    fn default() -> Self {
        Self::from(&PackConfig::default())
    }
}

impl From<&PackConfig> for StackingRules {
    fn from(config: &PackConfig) -> Self {
        Self {
            min_support_fraction: config.min_support_fraction,
            forbid_heavier_on_lighter: config.forbid_heavier_on_lighter,
        }
    }
}

/// Checks `candidate` against the current state of `session`.
///
/// A candidate addressed to the pallet index right after the last open pallet
/// is checked against an empty pallet. Any larger index is out of bounds.
pub fn check_placement(
    candidate: &Placement,
    session: &PalletSession,
    catalog: &ItemCatalog,
) -> Feasibility {
    let index = candidate.pallet_index();
    let existing: Vec<&Placement> = match session.pallet(index) {
        Some(load) => load.placements().iter().collect(),
        None if index == session.pallet_count() => Vec::new(),
        None => return Feasibility::Rejected(Rejection::OutOfBounds),
    };
    check_in_context(
        candidate,
        &existing,
        session.pallet_spec(),
        session.rules(),
        catalog,
    )
}

/// Checks `candidate` against an explicit set of placements on one pallet.
///
/// Items missing from the catalog are treated as stackable without a load
/// limit. The session never commits such items.
pub fn check_in_context(
    candidate: &Placement,
    existing: &[&Placement],
    pallet: &PalletSpec,
    rules: &StackingRules,
    catalog: &ItemCatalog,
) -> Feasibility {
    let cand = candidate.bounds();

    // 1. Bounds
    match pallet.bounds() {
        Ok(bounds) if cand.is_contained(&bounds) => {}
        _ => return Feasibility::Rejected(Rejection::OutOfBounds),
    }

    // 2. Overlap
    if existing.iter().any(|p| p.bounds().overlaps(cand)) {
        return Feasibility::Rejected(Rejection::Collision);
    }

    // 3. Weight
    let load: f64 = existing.iter().map(|p| p.weight()).sum();
    if load + candidate.weight() > pallet.max_weight() + EPSILON {
        return Feasibility::Rejected(Rejection::WeightExceeded);
    }

    let below: Vec<&Placement> = existing
        .iter()
        .copied()
        .filter(|p| cand.rests_on(p.bounds()))
        .collect();
    let above: Vec<&Placement> = existing
        .iter()
        .copied()
        .filter(|p| p.bounds().rests_on(cand))
        .collect();

    // 4. Fragile items
    let stackable = |p: &Placement| catalog.get(p.item_id()).map_or(true, |i| i.is_stackable());
    if below.iter().any(|&p| !stackable(p)) || (!above.is_empty() && !stackable(candidate)) {
        return Feasibility::Rejected(Rejection::StackingForbidden);
    }

    // 5. Support
    if cand.bottom() > EPSILON {
        let tops: Vec<Box3> = below.iter().map(|p| *p.bounds()).collect();
        if support_area(cand, &tops) + EPSILON < rules.min_support_fraction {
            return Feasibility::Rejected(Rejection::InsufficientSupport);
        }
    }

    // 6. Load on top
    if !load_capacity_ok(candidate, existing, catalog) {
        return Feasibility::Rejected(Rejection::LoadCapacityExceeded);
    }

    // 7. Heaviest at the bottom
    if rules.forbid_heavier_on_lighter {
        let heavier_on_lighter = below
            .iter()
            .any(|p| p.weight() + EPSILON < candidate.weight())
            || above
                .iter()
                .any(|p| p.weight() > candidate.weight() + EPSILON);
        if heavier_on_lighter {
            return Feasibility::Rejected(Rejection::HeavierOnLighter);
        }
    }

    Feasibility::Feasible
}

/// Verifies the load limits of the candidate and everything that supports it,
/// directly or transitively.
///
/// Each of these items carries the full weight of everything resting on it
/// through the support graph, the candidate included. Items elsewhere on the
/// pallet are unaffected by the candidate.
fn load_capacity_ok(candidate: &Placement, existing: &[&Placement], catalog: &ItemCatalog) -> bool {
    let mut nodes: Vec<&Placement> = existing.to_vec();
    nodes.push(candidate);
    let cand = nodes.len() - 1;

    // supports[i] lists the nodes i rests on, carried[i] the nodes resting on i.
    let n = nodes.len();
    let mut supports = vec![Vec::new(); n];
    let mut carried = vec![Vec::new(); n];
    for i in 0..n {
        for j in 0..n {
            if i != j && nodes[i].bounds().rests_on(nodes[j].bounds()) {
                supports[i].push(j);
                carried[j].push(i);
            }
        }
    }

    let affected = reachable(cand, &supports);
    affected.into_iter().all(|u| {
        let limit = catalog
            .get(nodes[u].item_id())
            .and_then(|item| item.max_load_on_top());
        match limit {
            None => true,
            Some(limit) => {
                let load: f64 = reachable(u, &carried)
                    .into_iter()
                    .filter(|&v| v != u)
                    .map(|v| nodes[v].weight())
                    .sum();
                load <= limit + EPSILON
            }
        }
    })
}

/// Nodes reachable from `start` along `edges`, `start` included.
fn reachable(start: usize, edges: &[Vec<usize>]) -> Vec<usize> {
    let mut seen = vec![false; edges.len()];
    let mut queue = VecDeque::from([start]);
    let mut out = Vec::new();
    seen[start] = true;
    while let Some(u) = queue.pop_front() {
        out.push(u);
        for &v in &edges[u] {
            if !seen[v] {
                seen[v] = true;
                queue.push_back(v);
            }
        }
    }
    out
}
