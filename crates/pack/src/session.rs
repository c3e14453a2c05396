//! Pallet session: the mutable working state of one packing job.
//!
//! A session owns the opened pallets and their placements, the backlog of
//! items still waiting for a decision, and the items declared unplaceable.
//! Every commit is re-validated with the feasibility checker. Once all items
//! are decided the session is sealed and becomes read-only.

use crate::feasibility::{check_in_context, Feasibility, Rejection, StackingRules};
use crate::item::ItemCatalog;
use crate::pallet::PalletSpec;
use crate::placement::Placement;
use pallet_piler_core::{Error, Result};
use std::fmt;
use std::ops::Deref;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why an item ended up unplaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UnplacedReason {
    /// No candidate position passed the feasibility checker. Carries the
    /// furthest check reached.
    Rejected(Rejection),
    /// The time budget ran out before the item was attempted.
    DeadlineExceeded,
}

impl fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnplacedReason::Rejected(r) => write!(f, "{r}"),
            UnplacedReason::DeadlineExceeded => f.write_str("DeadlineExceeded"),
        }
    }
}

/// An item the session gave up on.
#[derive(Debug, Clone, PartialEq)]
pub struct UnplacedItem {
    /// Item identifier.
    pub item_id: String,
    /// Why it was not placed.
    pub reason: UnplacedReason,
}

/// Remaining room on one pallet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capacity {
    /// Unoccupied volume.
    pub volume: f64,
    /// Weight that may still be added.
    pub weight: f64,
}

/// Placements on one opened pallet with running totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PalletLoad {
    placements: Vec<Placement>,
    weight: f64,
    volume: f64,
}

impl PalletLoad {
    /// Returns the placements in commit order.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Returns the running weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns the running occupied volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Returns the number of placements.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Returns true if nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    fn push(&mut self, placement: Placement) {
        self.weight += placement.weight();
        self.volume += placement.volume();
        self.placements.push(placement);
    }

    fn remove(&mut self, position: usize) -> Placement {
        let placement = self.placements.remove(position);
        self.recompute();
        placement
    }

    fn recompute(&mut self) {
        self.weight = self.placements.iter().map(Placement::weight).sum();
        self.volume = self.placements.iter().map(Placement::volume).sum();
    }
}

/// An atomic remove-then-reinsert edit used by the improvement pass.
///
/// Every removed item has to be inserted again. Insertions may also take items
/// from the unplaced list. Insertions are committed in order and may target
/// the pallet right after the last open one, which is then opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edit {
    /// Items taken off their pallets.
    pub removals: Vec<String>,
    /// Placements committed afterwards.
    pub insertions: Vec<Placement>,
}

/// Mutable state of one packing job.
#[derive(Debug, Clone)]
pub struct PalletSession {
    pallet: PalletSpec,
    rules: StackingRules,
    pallets: Vec<PalletLoad>,
    backlog: Vec<String>,
    unplaced: Vec<UnplacedItem>,
    partial: bool,
    sealed: bool,
}

impl PalletSession {
    /// Creates a session with no pallets and the given backlog.
    pub fn new(
        pallet: PalletSpec,
        rules: StackingRules,
        backlog: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            pallet,
            rules,
            pallets: Vec::new(),
            backlog: backlog.into_iter().collect(),
            unplaced: Vec::new(),
            partial: false,
            sealed: false,
        }
    }

    /// Creates a session whose backlog holds every unit of `catalog`.
    pub fn for_catalog(pallet: PalletSpec, rules: StackingRules, catalog: &ItemCatalog) -> Self {
        Self::new(
            pallet,
            rules,
            catalog.units().iter().map(|i| i.id().to_string()),
        )
    }

    /// Returns the pallet specification.
    pub fn pallet_spec(&self) -> &PalletSpec {
        &self.pallet
    }

    /// Returns the stacking rules placements are checked with.
    pub fn rules(&self) -> &StackingRules {
        &self.rules
    }

    /// Returns the number of opened pallets.
    pub fn pallet_count(&self) -> usize {
        self.pallets.len()
    }

    /// Returns the opened pallets.
    pub fn pallets(&self) -> &[PalletLoad] {
        &self.pallets
    }

    /// Returns one opened pallet.
    pub fn pallet(&self, index: usize) -> Option<&PalletLoad> {
        self.pallets.get(index)
    }

    /// Iterates over every placement on every pallet.
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.pallets.iter().flat_map(|p| p.placements.iter())
    }

    /// Returns the number of placed items.
    pub fn placed_count(&self) -> usize {
        self.pallets.iter().map(PalletLoad::len).sum()
    }

    /// Returns the combined volume of all placed items.
    pub fn placed_volume(&self) -> f64 {
        self.pallets.iter().map(PalletLoad::volume).sum()
    }

    /// Returns the items not yet decided on.
    pub fn backlog(&self) -> &[String] {
        &self.backlog
    }

    /// Returns the items declared unplaceable.
    pub fn unplaced(&self) -> &[UnplacedItem] {
        &self.unplaced
    }

    /// Returns true if the job stopped before every item was attempted.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Returns true once the session is read-only.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns true if no item is waiting for a decision.
    pub fn is_complete(&self) -> bool {
        self.backlog.is_empty()
    }

    /// Finds the pallet index and position of a placed item.
    pub fn locate(&self, item_id: &str) -> Option<(usize, usize)> {
        self.pallets.iter().enumerate().find_map(|(p, load)| {
            load.placements
                .iter()
                .position(|pl| pl.item_id() == item_id)
                .map(|i| (p, i))
        })
    }

    /// Volume utilization of one pallet (occupied / available).
    pub fn utilization(&self, index: usize) -> Option<f64> {
        self.pallets
            .get(index)
            .map(|p| p.volume / self.pallet.volume())
    }

    /// Weight utilization of one pallet (load / limit).
    pub fn weight_utilization(&self, index: usize) -> Option<f64> {
        self.pallets
            .get(index)
            .map(|p| p.weight / self.pallet.max_weight())
    }

    /// Unoccupied volume and remaining weight allowance of one pallet.
    pub fn remaining_capacity(&self, index: usize) -> Option<Capacity> {
        self.pallets.get(index).map(|p| Capacity {
            volume: (self.pallet.volume() - p.volume).max(0.0),
            weight: (self.pallet.max_weight() - p.weight).max(0.0),
        })
    }

    /// Opens a new empty pallet and returns its index.
    pub fn open_pallet(&mut self) -> Result<usize> {
        self.ensure_open()?;
        self.pallets.push(PalletLoad::default());
        log::debug!("opened pallet {}", self.pallets.len() - 1);
        Ok(self.pallets.len() - 1)
    }

    /// Commits a placement after re-validating it.
    ///
    /// Fails with [`Error::InvalidPlacement`] if the pallet is not open, the
    /// item is already placed, or the feasibility checker rejects it.
    pub fn place(
        &mut self,
        pallet_index: usize,
        placement: Placement,
        catalog: &ItemCatalog,
    ) -> Result<()> {
        self.ensure_open()?;
        let item = catalog.require(placement.item_id())?;
        let invalid = |reason: String| Error::InvalidPlacement {
            item: item.id().to_string(),
            pallet: pallet_index,
            reason,
        };

        if placement.pallet_index() != pallet_index {
            return Err(invalid(format!(
                "placement addressed to pallet {}",
                placement.pallet_index()
            )));
        }
        if pallet_index >= self.pallets.len() {
            return Err(invalid("pallet is not open".into()));
        }
        if self.locate(item.id()).is_some() {
            return Err(invalid("item is already placed".into()));
        }
        if (placement.weight() - item.weight()).abs() > f64::EPSILON {
            return Err(invalid("weight differs from catalog".into()));
        }
        let existing: Vec<&Placement> = self.pallets[pallet_index].placements.iter().collect();
        if let Feasibility::Rejected(reason) =
            check_in_context(&placement, &existing, &self.pallet, &self.rules, catalog)
        {
            return Err(invalid(reason.to_string()));
        }

        self.backlog.retain(|id| id != item.id());
        self.unplaced.retain(|u| u.item_id != item.id());
        self.pallets[pallet_index].push(placement);
        Ok(())
    }

    /// Takes an item off the backlog and records why it was not placed.
    pub fn mark_unplaceable(&mut self, item_id: &str, reason: UnplacedReason) -> Result<()> {
        self.ensure_open()?;
        if self.locate(item_id).is_some() {
            return Err(Error::Internal(format!(
                "item '{item_id}' is placed and cannot be marked unplaceable"
            )));
        }
        let before = self.backlog.len();
        self.backlog.retain(|id| id != item_id);
        if self.backlog.len() == before {
            return Err(Error::UnknownItem(item_id.to_string()));
        }
        self.unplaced.push(UnplacedItem {
            item_id: item_id.to_string(),
            reason,
        });
        Ok(())
    }

    /// Flags the session as a best-effort result.
    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    /// Applies a remove-then-reinsert edit atomically.
    ///
    /// Removals are applied first, then every placement left on an affected
    /// pallet is checked again (its support may have gone), then insertions are
    /// committed through [`PalletSession::place`]. Pallets left empty are
    /// dropped and the remaining ones renumbered. On any failure the session
    /// is restored to its state before the call.
    pub fn apply_edit(&mut self, edit: &Edit, catalog: &ItemCatalog) -> Result<()> {
        self.ensure_open()?;
        let snapshot = self.clone();
        match self.apply_edit_inner(edit, catalog) {
            Ok(()) => Ok(()),
            Err(e) => {
                *self = snapshot;
                Err(e)
            }
        }
    }

    fn apply_edit_inner(&mut self, edit: &Edit, catalog: &ItemCatalog) -> Result<()> {
        self.detach(&edit.removals, catalog)?;

        for placement in &edit.insertions {
            let index = placement.pallet_index();
            if index == self.pallets.len() {
                self.open_pallet()?;
            }
            self.place(index, placement.clone(), catalog)?;
        }

        if let Some(missing) = edit.removals.iter().find(|id| self.locate(id).is_none()) {
            return Err(Error::Internal(format!(
                "edit removed '{missing}' without reinserting it"
            )));
        }

        self.compact();
        Ok(())
    }

    /// Removes placements without reinserting them, then re-checks everything
    /// left on the affected pallets. The removed items are in flight until
    /// they are placed again.
    pub(crate) fn detach(&mut self, item_ids: &[String], catalog: &ItemCatalog) -> Result<()> {
        let mut touched = Vec::new();
        for id in item_ids {
            let (p, i) = self
                .locate(id)
                .ok_or_else(|| Error::UnknownItem(id.clone()))?;
            self.pallets[p].remove(i);
            if !touched.contains(&p) {
                touched.push(p);
            }
        }
        for p in touched {
            self.recheck_pallet(p, catalog)?;
        }
        Ok(())
    }

    /// Re-runs the checker on every placement of one pallet, each against all
    /// the others.
    fn recheck_pallet(&self, index: usize, catalog: &ItemCatalog) -> Result<()> {
        let load = &self.pallets[index];
        for (i, placement) in load.placements.iter().enumerate() {
            let others: Vec<&Placement> = load
                .placements
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, p)| p)
                .collect();
            if let Feasibility::Rejected(reason) =
                check_in_context(placement, &others, &self.pallet, &self.rules, catalog)
            {
                return Err(Error::InvalidPlacement {
                    item: placement.item_id().to_string(),
                    pallet: index,
                    reason: reason.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Re-runs the checker on every committed placement.
    pub fn verify(&self, catalog: &ItemCatalog) -> Result<()> {
        (0..self.pallets.len()).try_for_each(|index| self.recheck_pallet(index, catalog))
    }

    /// Drops empty pallets and renumbers the rest.
    fn compact(&mut self) {
        let before = self.pallets.len();
        self.pallets.retain(|p| !p.is_empty());
        if self.pallets.len() != before {
            log::debug!("compacted {} empty pallet(s)", before - self.pallets.len());
        }
        for (index, load) in self.pallets.iter_mut().enumerate() {
            for placement in &mut load.placements {
                placement.set_pallet_index(index);
            }
        }
    }

    /// Seals the session.
    ///
    /// Fails with [`Error::Internal`] while items are still in the backlog.
    pub fn seal(mut self) -> Result<SealedSession> {
        if !self.backlog.is_empty() {
            return Err(Error::Internal(format!(
                "cannot seal with {} item(s) undecided",
                self.backlog.len()
            )));
        }
        self.compact();
        self.sealed = true;
        Ok(SealedSession(self))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.sealed {
            Err(Error::SessionSealed)
        } else {
            Ok(())
        }
    }
}

/// A finished, read-only session.
#[derive(Debug, Clone)]
pub struct SealedSession(PalletSession);

impl SealedSession {
    /// Returns the inner session. It stays sealed: mutations fail with
    /// [`Error::SessionSealed`].
    pub fn into_inner(self) -> PalletSession {
        self.0
    }
}

impl Deref for SealedSession {
    type Target = PalletSession;

    fn deref(&self) -> &PalletSession {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Item, Orientation};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn setup() -> (ItemCatalog, PalletSession) {
        let items = vec![
            Item::new("A", 50.0, 50.0, 50.0, 100.0),
            Item::new("B", 50.0, 50.0, 50.0, 100.0),
            Item::new("C", 50.0, 50.0, 50.0, 100.0),
        ];
        let catalog = ItemCatalog::new(&items).unwrap();
        let session = PalletSession::for_catalog(
            PalletSpec::new(100.0, 100.0, 150.0, 500.0),
            StackingRules::default(),
            &catalog,
        );
        (catalog, session)
    }

    fn at(catalog: &ItemCatalog, id: &str, pallet: usize, x: f64, y: f64, z: f64) -> Placement {
        let item = catalog.require(id).unwrap();
        Placement::new(item, pallet, Vector3::new(x, y, z), Orientation::Lwh).unwrap()
    }

    #[test]
    fn test_place_updates_totals_and_backlog() {
        let (catalog, mut session) = setup();
        assert_eq!(session.backlog().len(), 3);
        let p = session.open_pallet().unwrap();
        session.place(p, at(&catalog, "A", 0, 0.0, 0.0, 0.0), &catalog).unwrap();

        assert_eq!(session.backlog(), &["B".to_string(), "C".to_string()]);
        assert_relative_eq!(session.utilization(0).unwrap(), 125000.0 / 1_500_000.0);
        assert_relative_eq!(session.weight_utilization(0).unwrap(), 0.2);
        let cap = session.remaining_capacity(0).unwrap();
        assert_relative_eq!(cap.weight, 400.0);
        assert_relative_eq!(cap.volume, 1_375_000.0);
        assert!(session.utilization(1).is_none());
    }

    #[test]
    fn test_place_rejects_infeasible() {
        let (catalog, mut session) = setup();
        session.open_pallet().unwrap();
        session.place(0, at(&catalog, "A", 0, 0.0, 0.0, 0.0), &catalog).unwrap();

        let err = session
            .place(0, at(&catalog, "B", 0, 25.0, 0.0, 0.0), &catalog)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPlacement { ref reason, .. } if reason == "Collision"));

        let err = session
            .place(1, at(&catalog, "B", 1, 0.0, 0.0, 0.0), &catalog)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPlacement { .. }));

        let err = session
            .place(0, at(&catalog, "A", 0, 50.0, 0.0, 0.0), &catalog)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPlacement { ref reason, .. } if reason.contains("already")));
        assert_eq!(session.placed_count(), 1);
    }

    #[test]
    fn test_mark_unplaceable() {
        let (_, mut session) = setup();
        session
            .mark_unplaceable("B", UnplacedReason::Rejected(Rejection::WeightExceeded))
            .unwrap();
        assert_eq!(session.unplaced().len(), 1);
        assert_eq!(session.backlog().len(), 2);
        assert!(matches!(
            session.mark_unplaceable("B", UnplacedReason::DeadlineExceeded),
            Err(Error::UnknownItem(_))
        ));
    }

    #[test]
    fn test_apply_edit_moves_item() {
        let (catalog, mut session) = setup();
        session.open_pallet().unwrap();
        session.open_pallet().unwrap();
        session.place(0, at(&catalog, "A", 0, 0.0, 0.0, 0.0), &catalog).unwrap();
        session.place(1, at(&catalog, "B", 1, 0.0, 0.0, 0.0), &catalog).unwrap();

        let edit = Edit {
            removals: vec!["B".into()],
            insertions: vec![at(&catalog, "B", 0, 50.0, 0.0, 0.0)],
        };
        session.apply_edit(&edit, &catalog).unwrap();

        assert_eq!(session.pallet_count(), 1);
        assert_eq!(session.locate("B"), Some((0, 1)));
        assert!(session.verify(&catalog).is_ok());
    }

    #[test]
    fn test_apply_edit_reverts_on_failure() {
        let (catalog, mut session) = setup();
        session.open_pallet().unwrap();
        session.place(0, at(&catalog, "A", 0, 0.0, 0.0, 0.0), &catalog).unwrap();
        session.place(0, at(&catalog, "B", 0, 0.0, 0.0, 50.0), &catalog).unwrap();

        // Removing A leaves B floating.
        let edit = Edit {
            removals: vec!["A".into()],
            insertions: vec![at(&catalog, "A", 0, 50.0, 0.0, 0.0)],
        };
        assert!(session.apply_edit(&edit, &catalog).is_err());
        assert_eq!(session.locate("A"), Some((0, 0)));
        assert_eq!(session.locate("B"), Some((0, 1)));

        // A removal that is never reinserted is refused as well.
        let edit = Edit {
            removals: vec!["B".into()],
            insertions: vec![],
        };
        assert!(session.apply_edit(&edit, &catalog).is_err());
        assert_eq!(session.placed_count(), 2);
    }

    #[test]
    fn test_seal() {
        let (catalog, mut session) = setup();
        session.open_pallet().unwrap();
        session.place(0, at(&catalog, "A", 0, 0.0, 0.0, 0.0), &catalog).unwrap();
        assert!(session.clone().seal().is_err());

        session
            .mark_unplaceable("B", UnplacedReason::DeadlineExceeded)
            .unwrap();
        session
            .mark_unplaceable("C", UnplacedReason::DeadlineExceeded)
            .unwrap();
        let sealed = session.seal().unwrap();
        assert!(sealed.is_sealed());
        assert_eq!(sealed.placed_count(), 1);

        let mut inner = sealed.into_inner();
        assert!(matches!(inner.open_pallet(), Err(Error::SessionSealed)));
    }
}
