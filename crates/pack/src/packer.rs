//! Pallet loading engine.

use crate::exhaustive::search_orders;
use crate::extreme_point::ExtremePointSet;
use crate::feasibility::StackingRules;
use crate::improve::improve;
use crate::item::{Item, ItemCatalog};
use crate::packing_utils::{order_units, search_pallet, RejectionTracker};
use crate::pallet::PalletSpec;
use crate::session::{PalletSession, SealedSession, UnplacedReason};
use pallet_piler_core::solver::{Deadline, PackConfig, ProgressCallback, ProgressInfo, Solver};
use pallet_piler_core::Result;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Constructive first-fit, bottom-left-fill loader with optional exhaustive
/// order search and a local improvement pass.
pub struct PalletPacker {
    config: PackConfig,
    cancelled: Arc<AtomicBool>,
}

impl PalletPacker {
    /// Creates a new packer with the given configuration.
    pub fn new(config: PackConfig) -> Self {
        Self {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a packer with default configuration.
    pub fn default_config() -> Self {
        Self::new(PackConfig::default())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Packs `items` onto as many `pallet`s as needed and allowed.
    ///
    /// Intake errors (invalid geometry, duplicate ids, invalid configuration)
    /// fail the job. Everything else yields a sealed session, possibly with
    /// unplaced items or flagged partial when the deadline expired.
    pub fn pack(&self, items: &[Item], pallet: &PalletSpec) -> Result<SealedSession> {
        let catalog = ItemCatalog::new(items)?;
        self.pack_catalog(&catalog, pallet, None)
    }

    /// Packs with a progress callback invoked per item and per phase.
    pub fn pack_with_progress(
        &self,
        items: &[Item],
        pallet: &PalletSpec,
        callback: ProgressCallback,
    ) -> Result<SealedSession> {
        let catalog = ItemCatalog::new(items)?;
        self.pack_catalog(&catalog, pallet, Some(&callback))
    }

    /// Packs the units of an already validated catalog.
    pub fn pack_catalog(
        &self,
        catalog: &ItemCatalog,
        pallet: &PalletSpec,
        progress: Option<&ProgressCallback>,
    ) -> Result<SealedSession> {
        self.config.validate()?;
        pallet.validate()?;

        // Reset cancellation flag
        self.cancelled.store(false, Ordering::Relaxed);
        let deadline = Deadline::new(self.config.time_limit_ms, Arc::clone(&self.cancelled));

        let rules = StackingRules::from(&self.config);
        let limit = self.config.pallet_limit();
        let order = order_units(catalog, self.config.ordering_key);
        log::info!(
            "packing {} units on {}x{}x{} pallets (ordering {:?}, pallet limit {:?})",
            catalog.len(),
            pallet.length(),
            pallet.width(),
            pallet.max_height(),
            self.config.ordering_key,
            limit
        );

        let threshold = self.config.exhaustive_threshold();
        let mut session = if threshold > 1 && catalog.len() > 1 && catalog.len() <= threshold {
            search_orders(&order, catalog, pallet, rules, limit, &deadline)?
        } else {
            let mut session = PalletSession::for_catalog(pallet.clone(), rules, catalog);
            construct(&order, &mut session, catalog, limit, &deadline, progress)?;
            session
        };
        log::info!(
            "constructive phase: {} placed, {} unplaced, {} pallet(s)",
            session.placed_count(),
            session.unplaced().len(),
            session.pallet_count()
        );

        let budget = self.config.improvement;
        if budget.is_enabled() && !session.is_partial() && !deadline.expired() {
            let improve_deadline = deadline.tightened(budget.time_limit_ms);
            let iterations = improve(
                &mut session,
                catalog,
                self.config.ordering_key,
                budget.max_iterations,
                &improve_deadline,
                progress,
            )?;
            log::info!(
                "improvement phase: {} move(s) committed, {} pallet(s)",
                iterations,
                session.pallet_count()
            );
        }

        if let Some(cb) = progress {
            cb(progress_of(&session, catalog, &deadline, "done").finished());
        }
        session.seal()
    }

    /// Requests cancellation; the running job returns its best result so far.
    ///
    /// The flag is shared by every job run on this packer and is cleared when
    /// a job starts, so a cancel issued before or between jobs does not reach
    /// the next one. Use one packer per job to cancel jobs independently.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl Solver for PalletPacker {
    type Item = Item;
    type Container = PalletSpec;
    type Output = SealedSession;

    fn solve(&self, items: &[Item], pallet: &PalletSpec) -> Result<SealedSession> {
        self.pack(items, pallet)
    }

    fn solve_with_progress(
        &self,
        items: &[Item],
        pallet: &PalletSpec,
        callback: ProgressCallback,
    ) -> Result<SealedSession> {
        self.pack_with_progress(items, pallet, callback)
    }

    fn cancel(&self) {
        PalletPacker::cancel(self);
    }
}

/// Packs `items` with `config` in one call.
pub fn pack(items: &[Item], pallet: &PalletSpec, config: &PackConfig) -> Result<SealedSession> {
    PalletPacker::new(config.clone()).pack(items, pallet)
}

/// Places units one by one in `order`.
///
/// Each unit goes to the cheapest feasible position on the first open pallet
/// that admits it. A new pallet is opened only when the unit fits on an empty
/// one and the pallet limit allows it; otherwise the unit is marked
/// unplaceable with the furthest rejection seen. On deadline expiry the
/// remaining units are marked and the session is flagged partial.
pub(crate) fn construct(
    order: &[&Item],
    session: &mut PalletSession,
    catalog: &ItemCatalog,
    limit: Option<usize>,
    deadline: &Deadline,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    let spec = session.pallet_spec().clone();
    let mut points: Vec<ExtremePointSet> = session
        .pallets()
        .iter()
        .map(|p| ExtremePointSet::from_placements(&spec, p.placements()))
        .collect();

    for (n, item) in order.iter().enumerate() {
        if deadline.expired() {
            log::warn!(
                "deadline reached after {} ms, {} unit(s) not attempted",
                deadline.elapsed_ms(),
                order.len() - n
            );
            for rest in &order[n..] {
                session.mark_unplaceable(rest.id(), UnplacedReason::DeadlineExceeded)?;
            }
            session.mark_partial();
            break;
        }

        let mut tracker = RejectionTracker::default();
        let mut placed = false;
        for index in 0..session.pallet_count() {
            if let Some(p) = search_pallet(session, &points[index], item, index, catalog, &mut tracker) {
                log::debug!(
                    "{} -> pallet {} at ({}, {}, {}) {:?}",
                    item.id(),
                    index,
                    p.position().x,
                    p.position().y,
                    p.position().z,
                    p.orientation()
                );
                points[index].insert(*p.bounds());
                session.place(index, p, catalog)?;
                placed = true;
                break;
            }
        }

        if !placed {
            let index = session.pallet_count();
            let mut fresh = ExtremePointSet::new(&spec);
            let can_open = limit.map_or(true, |l| index < l);
            let mut empty_tracker = RejectionTracker::default();
            match search_pallet(session, &fresh, item, index, catalog, &mut empty_tracker) {
                Some(p) if can_open => {
                    session.open_pallet()?;
                    log::debug!("{} -> new pallet {}", item.id(), index);
                    fresh.insert(*p.bounds());
                    points.push(fresh);
                    session.place(index, p, catalog)?;
                    placed = true;
                }
                Some(_) => {}
                None => {
                    if let Some(r) = empty_tracker.deepest() {
                        tracker.record(r);
                    }
                }
            }
        }

        if !placed {
            let reason = tracker.reason();
            log::warn!("{} could not be placed: {}", item.id(), reason);
            session.mark_unplaceable(item.id(), UnplacedReason::Rejected(reason))?;
        }

        if let Some(cb) = progress {
            cb(progress_of(session, catalog, deadline, "constructive")
                .with_iteration(n as u32 + 1, order.len() as u32));
        }
    }
    Ok(())
}

pub(crate) fn progress_of(
    session: &PalletSession,
    catalog: &ItemCatalog,
    deadline: &Deadline,
    phase: &str,
) -> ProgressInfo {
    let capacity = session.pallet_spec().volume() * session.pallet_count() as f64;
    let utilization = if capacity > 0.0 {
        session.placed_volume() / capacity
    } else {
        0.0
    };
    ProgressInfo::new()
        .with_phase(phase)
        .with_items(session.placed_count(), catalog.len())
        .with_pallets(session.pallet_count())
        .with_utilization(utilization)
        .with_elapsed(deadline.elapsed_ms())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feasibility::Rejection;
    use crate::item::{OrientationConstraint, StackClass};
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    #[test]
    fn test_simple_packing() {
        let items = vec![
            Item::new("B1", 20.0, 20.0, 20.0, 5.0).with_quantity(3),
            Item::new("B2", 15.0, 15.0, 15.0, 5.0).with_quantity(2),
        ];
        let pallet = PalletSpec::new(100.0, 80.0, 50.0, 1000.0);
        let session = PalletPacker::default_config().pack(&items, &pallet).unwrap();

        assert_eq!(session.placed_count(), 5);
        assert_eq!(session.pallet_count(), 1);
        assert!(session.unplaced().is_empty());
        assert!(session.is_sealed());
    }

    #[test]
    fn test_weight_limit_opens_pallets() {
        let items = vec![Item::new("B", 20.0, 20.0, 20.0, 100.0).with_quantity(10)];
        let pallet = PalletSpec::new(100.0, 80.0, 50.0, 350.0);
        let session = pack(&items, &pallet, &PackConfig::greedy()).unwrap();

        assert_eq!(session.placed_count(), 10);
        assert_eq!(session.pallet_count(), 4);
        for load in session.pallets() {
            assert!(load.weight() <= 350.0);
        }
    }

    #[test]
    fn test_single_pallet_marks_overflow_unplaced() {
        let items = vec![Item::new("B", 20.0, 20.0, 20.0, 100.0).with_quantity(5)];
        let pallet = PalletSpec::new(100.0, 80.0, 50.0, 350.0);
        let config = PackConfig::greedy().with_multiple_pallets(false);
        let session = pack(&items, &pallet, &config).unwrap();

        assert_eq!(session.pallet_count(), 1);
        assert_eq!(session.placed_count(), 3);
        assert_eq!(session.unplaced().len(), 2);
        for u in session.unplaced() {
            assert_eq!(u.reason, UnplacedReason::Rejected(Rejection::WeightExceeded));
        }
    }

    #[test]
    fn test_oversized_item_is_out_of_bounds() {
        let items = vec![Item::new("Huge", 200.0, 10.0, 10.0, 1.0)];
        let pallet = PalletSpec::new(100.0, 100.0, 100.0, 100.0);
        let session = pack(&items, &pallet, &PackConfig::greedy()).unwrap();
        assert_eq!(session.pallet_count(), 0);
        assert_eq!(
            session.unplaced()[0].reason,
            UnplacedReason::Rejected(Rejection::OutOfBounds)
        );
    }

    #[test]
    fn test_rotation_lets_long_item_fit() {
        let items = vec![Item::new("Long", 10.0, 80.0, 10.0, 1.0).with_orientation(OrientationConstraint::Upright)];
        let pallet = PalletSpec::new(100.0, 50.0, 50.0, 100.0);
        let session = pack(&items, &pallet, &PackConfig::greedy()).unwrap();
        let p = &session.pallets()[0].placements()[0];
        assert!(p.orientation().is_rotated());
        assert_relative_eq!(p.extents().x, 80.0);
    }

    #[test]
    fn test_fragile_item_is_not_stacked_on() {
        let items = vec![
            Item::new("Glass", 50.0, 50.0, 50.0, 10.0).with_stack_class(StackClass::NonStackable),
            Item::new("Box", 50.0, 50.0, 40.0, 10.0),
        ];
        let pallet = PalletSpec::new(100.0, 50.0, 150.0, 500.0);
        let session = pack(&items, &pallet, &PackConfig::greedy()).unwrap();
        let placements = session.pallets()[0].placements();
        assert_eq!(placements.len(), 2);
        for p in placements {
            assert_relative_eq!(p.position().z, 0.0);
        }
    }

    #[test]
    fn test_cancelled_job_is_partial() {
        let items = vec![Item::new("B", 10.0, 10.0, 10.0, 1.0).with_quantity(20)];
        let pallet = PalletSpec::new(100.0, 100.0, 100.0, 1000.0);
        let packer = PalletPacker::new(PackConfig::greedy());

        // Cancel from inside the progress callback after the first unit.
        let flag = Arc::clone(&packer.cancelled);
        let callback: ProgressCallback = Box::new(move |info: ProgressInfo| {
            if info.items_placed >= 1 {
                flag.store(true, Ordering::Relaxed);
            }
        });
        let session = packer.pack_with_progress(&items, &pallet, callback).unwrap();

        assert!(session.is_partial());
        assert_eq!(session.placed_count(), 1);
        assert_eq!(session.unplaced().len(), 19);
        assert!(session
            .unplaced()
            .iter()
            .all(|u| u.reason == UnplacedReason::DeadlineExceeded));
    }

    #[test]
    fn test_cancel_before_pack_is_cleared() {
        let items = vec![Item::new("B", 10.0, 10.0, 10.0, 1.0).with_quantity(5)];
        let pallet = PalletSpec::new(100.0, 100.0, 100.0, 1000.0);
        let packer = PalletPacker::new(PackConfig::greedy());

        packer.cancel();
        let session = packer.pack(&items, &pallet).unwrap();

        assert!(!session.is_partial());
        assert_eq!(session.placed_count(), 5);
        assert!(session.unplaced().is_empty());
    }

    #[test]
    fn test_progress_reports_phases() {
        let items = vec![Item::new("B", 10.0, 10.0, 10.0, 1.0).with_quantity(3)];
        let pallet = PalletSpec::new(100.0, 100.0, 100.0, 1000.0);
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let callback: ProgressCallback = Box::new(move |info: ProgressInfo| {
            sink.lock().unwrap().push((info.phase.clone(), info.running));
        });
        PalletPacker::default_config()
            .pack_with_progress(&items, &pallet, callback)
            .unwrap();

        let phases = phases.lock().unwrap();
        assert_eq!(phases[0].0, "constructive");
        assert_eq!(phases.last().unwrap(), &("done".to_string(), false));
    }

    #[test]
    fn test_invalid_config_fails_job() {
        let items = vec![Item::new("B", 10.0, 10.0, 10.0, 1.0)];
        let pallet = PalletSpec::new(100.0, 100.0, 100.0, 1000.0);
        let config = PackConfig::default().with_min_support_fraction(-0.1);
        assert!(pack(&items, &pallet, &config).is_err());

        let bad_pallet = PalletSpec::new(0.0, 100.0, 100.0, 1000.0);
        assert!(pack(&items, &bad_pallet, &PackConfig::default()).is_err());
    }
}
