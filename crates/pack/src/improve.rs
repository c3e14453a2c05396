//! Local improvement pass.
//!
//! Each iteration enumerates candidate moves on the current session,
//! evaluates all of them in parallel on private clones, and commits the best
//! strictly improving one through [`PalletSession::apply_edit`]. Ties go to the
//! move enumerated first. The pass stops when the iteration budget or the
//! deadline is exhausted, or when no move improves the [`Score`].
//!
//! Moves:
//! - insert an unplaced item into an open pallet
//! - relocate an item to an earlier pallet
//! - swap a smaller item on an earlier pallet with a larger one on a later pallet
//! - repack a whole pallet together with one unplaced item

use crate::extreme_point::ExtremePointSet;
use crate::item::{Item, ItemCatalog};
use crate::packer::progress_of;
use crate::packing_utils::{search_pallet, sort_units, RejectionTracker, Score};
use crate::placement::Placement;
use crate::session::{Edit, PalletSession};
use pallet_piler_core::solver::{Deadline, ProgressCallback};
use pallet_piler_core::{OrderingKey, Result, EPSILON};
use rayon::prelude::*;

/// Upper bound on the moves evaluated per iteration.
const MAX_MOVES_PER_ITERATION: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
enum Move {
    Insert { item: String },
    Relocate { item: String, to: usize },
    Swap { early: String, late: String },
    Repack { pallet: usize, extra: String },
}

/// Runs the improvement pass and returns the number of committed moves.
pub(crate) fn improve(
    session: &mut PalletSession,
    catalog: &ItemCatalog,
    key: OrderingKey,
    max_iterations: u32,
    deadline: &Deadline,
    progress: Option<&ProgressCallback>,
) -> Result<u32> {
    let mut committed = 0;
    for iteration in 0..max_iterations {
        if deadline.expired() {
            log::warn!("improvement stopped by deadline after {} iteration(s)", iteration);
            break;
        }

        let current = Score::of(session);
        let moves = enumerate_moves(session, catalog);
        let snapshot: &PalletSession = session;
        let evaluated: Vec<(Score, Edit)> = moves
            .par_iter()
            .filter_map(|m| evaluate(m, snapshot, catalog, key))
            .filter(|(score, _)| score.better_than(&current))
            .collect();

        let mut best: Option<(Score, Edit)> = None;
        for (score, edit) in evaluated {
            match &best {
                Some((top, _)) if !score.better_than(top) => {}
                _ => best = Some((score, edit)),
            }
        }

        let Some((score, edit)) = best else {
            log::debug!("no improving move among {} candidates", moves.len());
            break;
        };
        session.apply_edit(&edit, catalog)?;
        committed += 1;
        log::debug!(
            "iteration {}: committed edit of {} removal(s), {} insertion(s), slack {:.3}",
            iteration,
            edit.removals.len(),
            edit.insertions.len(),
            score.slack
        );

        if let Some(cb) = progress {
            cb(progress_of(session, catalog, deadline, "improvement")
                .with_iteration(iteration + 1, max_iterations));
        }
    }
    Ok(committed)
}

fn enumerate_moves(session: &PalletSession, catalog: &ItemCatalog) -> Vec<Move> {
    let mut moves = Vec::new();
    let volume = |id: &str| catalog.get(id).map_or(0.0, Item::volume);

    for u in session.unplaced() {
        moves.push(Move::Insert {
            item: u.item_id.clone(),
        });
    }

    for (from, load) in session.pallets().iter().enumerate().skip(1) {
        for p in load.placements() {
            for to in 0..from {
                moves.push(Move::Relocate {
                    item: p.item_id().to_string(),
                    to,
                });
            }
        }
    }

    for (p, early) in session.pallets().iter().enumerate() {
        for late in &session.pallets()[p + 1..] {
            for a in early.placements() {
                for b in late.placements() {
                    if volume(b.item_id()) > volume(a.item_id()) + EPSILON {
                        moves.push(Move::Swap {
                            early: a.item_id().to_string(),
                            late: b.item_id().to_string(),
                        });
                    }
                }
            }
        }
    }

    for pallet in 0..session.pallet_count() {
        for u in session.unplaced() {
            moves.push(Move::Repack {
                pallet,
                extra: u.item_id.clone(),
            });
        }
    }

    moves.truncate(MAX_MOVES_PER_ITERATION);
    moves
}

/// Plays a move on a clone of the session and returns its score and the edit
/// that reproduces it, or None if the move is not feasible.
fn evaluate(
    m: &Move,
    session: &PalletSession,
    catalog: &ItemCatalog,
    key: OrderingKey,
) -> Option<(Score, Edit)> {
    let mut trial = session.clone();
    let edit = match m {
        Move::Insert { item } => {
            let unit = catalog.get(item)?;
            let placement = (0..trial.pallet_count())
                .find_map(|index| first_fit(&trial, unit, index, catalog))?;
            commit(&mut trial, &placement, catalog)?;
            Edit {
                removals: Vec::new(),
                insertions: vec![placement],
            }
        }
        Move::Relocate { item, to } => {
            let unit = catalog.get(item)?;
            trial.detach(std::slice::from_ref(item), catalog).ok()?;
            let placement = first_fit(&trial, unit, *to, catalog)?;
            commit(&mut trial, &placement, catalog)?;
            Edit {
                removals: vec![item.clone()],
                insertions: vec![placement],
            }
        }
        Move::Swap { early, late } => {
            let (early_pallet, _) = trial.locate(early)?;
            let (late_pallet, _) = trial.locate(late)?;
            let removals = vec![early.clone(), late.clone()];
            trial.detach(&removals, catalog).ok()?;
            let first = first_fit(&trial, catalog.get(late)?, early_pallet, catalog)?;
            commit(&mut trial, &first, catalog)?;
            let second = first_fit(&trial, catalog.get(early)?, late_pallet, catalog)?;
            commit(&mut trial, &second, catalog)?;
            Edit {
                removals,
                insertions: vec![first, second],
            }
        }
        Move::Repack { pallet, extra } => {
            let removals: Vec<String> = trial
                .pallet(*pallet)?
                .placements()
                .iter()
                .map(|p| p.item_id().to_string())
                .collect();
            let mut units: Vec<&Item> = removals
                .iter()
                .chain(std::iter::once(extra))
                .map(|id| catalog.get(id))
                .collect::<Option<_>>()?;
            sort_units(&mut units, key);

            trial.detach(&removals, catalog).ok()?;
            let mut insertions = Vec::with_capacity(units.len());
            for unit in units {
                let placement = first_fit(&trial, unit, *pallet, catalog)?;
                commit(&mut trial, &placement, catalog)?;
                insertions.push(placement);
            }
            Edit {
                removals,
                insertions,
            }
        }
    };
    Some((Score::of(&trial), edit))
}

fn first_fit(
    session: &PalletSession,
    item: &Item,
    index: usize,
    catalog: &ItemCatalog,
) -> Option<Placement> {
    let load = session.pallet(index)?;
    let points = ExtremePointSet::from_placements(session.pallet_spec(), load.placements());
    let mut tracker = RejectionTracker::default();
    search_pallet(session, &points, item, index, catalog, &mut tracker)
}

fn commit(session: &mut PalletSession, placement: &Placement, catalog: &ItemCatalog) -> Option<()> {
    session
        .place(placement.pallet_index(), placement.clone(), catalog)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feasibility::{Rejection, StackingRules};
    use crate::item::Orientation;
    use crate::pallet::PalletSpec;
    use crate::session::UnplacedReason;
    use nalgebra::Vector3;

    fn cube(id: &str, side: f64) -> Item {
        Item::new(id, side, side, side, 1.0)
    }

    #[test]
    fn test_relocate_merges_pallets() {
        let items = vec![cube("A", 50.0), cube("B", 50.0)];
        let catalog = ItemCatalog::new(&items).unwrap();
        let spec = PalletSpec::new(100.0, 100.0, 100.0, 100.0);
        let mut session = PalletSession::for_catalog(spec, StackingRules::default(), &catalog);

        // Deliberately wasteful start: one item per pallet.
        for (index, id) in ["A", "B"].into_iter().enumerate() {
            session.open_pallet().unwrap();
            let p = Placement::new(catalog.require(id).unwrap(), index, Vector3::zeros(), Orientation::Lwh)
                .unwrap();
            session.place(index, p, &catalog).unwrap();
        }

        let committed = improve(
            &mut session,
            &catalog,
            OrderingKey::VolumeDesc,
            10,
            &Deadline::unbounded(),
            None,
        )
        .unwrap();

        assert!(committed >= 1);
        assert_eq!(session.pallet_count(), 1);
        assert_eq!(session.placed_count(), 2);
        assert!(session.verify(&catalog).is_ok());
    }

    #[test]
    fn test_insert_recovers_unplaced_item() {
        let items = vec![cube("A", 50.0), cube("B", 50.0)];
        let catalog = ItemCatalog::new(&items).unwrap();
        let spec = PalletSpec::new(100.0, 100.0, 100.0, 100.0);
        let mut session = PalletSession::for_catalog(spec, StackingRules::default(), &catalog);
        session.open_pallet().unwrap();
        let p = Placement::new(catalog.require("A").unwrap(), 0, Vector3::zeros(), Orientation::Lwh)
            .unwrap();
        session.place(0, p, &catalog).unwrap();
        session
            .mark_unplaceable("B", UnplacedReason::Rejected(Rejection::Collision))
            .unwrap();

        improve(
            &mut session,
            &catalog,
            OrderingKey::VolumeDesc,
            5,
            &Deadline::unbounded(),
            None,
        )
        .unwrap();

        assert_eq!(session.placed_count(), 2);
        assert!(session.unplaced().is_empty());
    }

    #[test]
    fn test_zero_iterations_is_noop() {
        let items = vec![cube("A", 50.0)];
        let catalog = ItemCatalog::new(&items).unwrap();
        let spec = PalletSpec::new(100.0, 100.0, 100.0, 100.0);
        let mut session = PalletSession::for_catalog(spec, StackingRules::default(), &catalog);
        session
            .mark_unplaceable("A", UnplacedReason::DeadlineExceeded)
            .unwrap();
        let n = improve(
            &mut session,
            &catalog,
            OrderingKey::VolumeDesc,
            0,
            &Deadline::unbounded(),
            None,
        )
        .unwrap();
        assert_eq!(n, 0);
        assert_eq!(session.unplaced().len(), 1);
    }
}
