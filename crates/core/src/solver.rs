//! Solver trait, packing configuration and run budgets.

use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bound on the number of units the exhaustive order search accepts.
pub const EXHAUSTIVE_ITEM_CAP: usize = 8;

/// Priority key used to order items before constructive placement.
///
/// Every key breaks ties by descending volume, then descending weight, then
/// ascending identifier, so the order is total and deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OrderingKey {
    /// Largest volume first.
    #[default]
    VolumeDesc,
    /// Heaviest first.
    WeightDesc,
    /// Largest base footprint first.
    FootprintDesc,
    /// Tallest first.
    HeightDesc,
    /// Keep the order in which items were submitted.
    Input,
}

/// Budget for the local improvement pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImprovementBudget {
    /// Maximum number of committed improvement iterations (0 = skip the pass).
    pub max_iterations: u32,
    /// Wall-clock limit for the pass in milliseconds (0 = no extra limit).
    pub time_limit_ms: u64,
}

impl ImprovementBudget {
    /// A budget that skips the improvement pass entirely.
    pub fn disabled() -> Self {
        Self {
            max_iterations: 0,
            time_limit_ms: 0,
        }
    }

    /// An iteration-bounded budget with no wall-clock limit.
    pub fn iterations(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            time_limit_ms: 0,
        }
    }

    /// Returns true if the pass should run at all.
    pub fn is_enabled(&self) -> bool {
        self.max_iterations > 0
    }
}

impl Default for ImprovementBudget {
    fn default() -> Self {
        Self::iterations(20)
    }
}

/// Configuration of a packing job.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PackConfig {
    /// Minimum supported fraction of an item's base when it is not on the floor.
    pub min_support_fraction: f64,

    /// Whether the engine may open more than one pallet.
    pub allow_multiple_pallets: bool,

    /// Hard cap on the number of pallets (None = unbounded).
    pub max_pallets: Option<usize>,

    /// Budget of the local improvement pass.
    pub improvement: ImprovementBudget,

    /// Priority key for the constructive phase.
    pub ordering_key: OrderingKey,

    /// Overall time limit in milliseconds (0 = none).
    pub time_limit_ms: u64,

    /// Jobs with at most this many units are solved by exhaustive order search
    /// (0 = never). Clamped to [`EXHAUSTIVE_ITEM_CAP`].
    pub exhaustive_max_items: usize,

    /// Reject items that would rest on a lighter item.
    pub forbid_heavier_on_lighter: bool,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            min_support_fraction: 0.75,
            allow_multiple_pallets: true,
            max_pallets: None,
            improvement: ImprovementBudget::default(),
            ordering_key: OrderingKey::default(),
            time_limit_ms: 0,
            exhaustive_max_items: 0,
            forbid_heavier_on_lighter: false,
        }
    }
}

impl PackConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure greedy baseline: no improvement pass, no exhaustive search.
    pub fn greedy() -> Self {
        Self::default()
            .with_improvement(ImprovementBudget::disabled())
            .with_exhaustive_max_items(0)
    }

    /// Sets the minimum support fraction.
    pub fn with_min_support_fraction(mut self, fraction: f64) -> Self {
        self.min_support_fraction = fraction;
        self
    }

    /// Allows or forbids opening more than one pallet.
    pub fn with_multiple_pallets(mut self, allow: bool) -> Self {
        self.allow_multiple_pallets = allow;
        self
    }

    /// Caps the number of pallets.
    pub fn with_max_pallets(mut self, max: usize) -> Self {
        self.max_pallets = Some(max);
        self
    }

    /// Sets the improvement budget.
    pub fn with_improvement(mut self, budget: ImprovementBudget) -> Self {
        self.improvement = budget;
        self
    }

    /// Sets the ordering key.
    pub fn with_ordering_key(mut self, key: OrderingKey) -> Self {
        self.ordering_key = key;
        self
    }

    /// Sets the overall time limit in milliseconds.
    pub fn with_time_limit(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    /// Sets the exhaustive search threshold.
    pub fn with_exhaustive_max_items(mut self, n: usize) -> Self {
        self.exhaustive_max_items = n;
        self
    }

    /// Enables the heaviest-at-the-bottom rule.
    pub fn with_forbid_heavier_on_lighter(mut self, enabled: bool) -> Self {
        self.forbid_heavier_on_lighter = enabled;
        self
    }

    /// Number of pallets the engine may use.
    pub fn pallet_limit(&self) -> Option<usize> {
        if self.allow_multiple_pallets {
            self.max_pallets
        } else {
            Some(1)
        }
    }

    /// Effective exhaustive threshold after applying the hard cap.
    pub fn exhaustive_threshold(&self) -> usize {
        self.exhaustive_max_items.min(EXHAUSTIVE_ITEM_CAP)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_support_fraction) {
            return Err(Error::ConfigError(format!(
                "min_support_fraction must be within [0, 1], got {}",
                self.min_support_fraction
            )));
        }
        if self.max_pallets == Some(0) {
            return Err(Error::ConfigError(
                "max_pallets must be at least 1".into(),
            ));
        }
        if self.exhaustive_max_items > EXHAUSTIVE_ITEM_CAP {
            log::warn!(
                "exhaustive_max_items {} exceeds cap {}, clamping",
                self.exhaustive_max_items,
                EXHAUSTIVE_ITEM_CAP
            );
        }
        Ok(())
    }
}

/// Wall-clock deadline combined with a cooperative cancellation flag.
///
/// Checked between major algorithm steps. Expiry is not an error: the engine
/// returns the best result found so far and flags it as partial.
#[derive(Debug, Clone)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    /// Creates a deadline `limit_ms` milliseconds from now (0 = no limit).
    pub fn new(limit_ms: u64, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            start: Instant::now(),
            limit: (limit_ms > 0).then(|| Duration::from_millis(limit_ms)),
            cancelled,
        }
    }

    /// A deadline that never expires on its own.
    pub fn unbounded() -> Self {
        Self::new(0, Arc::new(AtomicBool::new(false)))
    }

    /// Returns a deadline that expires at the earlier of this one and `limit_ms`
    /// from now, sharing the cancellation flag.
    pub fn tightened(&self, limit_ms: u64) -> Self {
        if limit_ms == 0 {
            return self.clone();
        }
        let sub = Self::new(limit_ms, Arc::clone(&self.cancelled));
        match self.remaining() {
            Some(left) if left < Duration::from_millis(limit_ms) => self.clone(),
            _ => sub,
        }
    }

    /// Returns true once the limit has passed or cancellation was requested.
    pub fn expired(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        self.limit.is_some_and(|limit| self.start.elapsed() >= limit)
    }

    /// Time left before the limit, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.limit
            .map(|limit| limit.saturating_sub(self.start.elapsed()))
    }

    /// Milliseconds since the deadline was created.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Progress callback for long-running operations.
pub type ProgressCallback = Box<dyn Fn(ProgressInfo) + Send + Sync>;

/// Progress information during packing.
#[derive(Debug, Clone, Default)]
pub struct ProgressInfo {
    /// Current iteration within the phase.
    pub iteration: u32,
    /// Total expected iterations (0 if unknown).
    pub total_iterations: u32,
    /// Volume utilization over the pallets used so far (0.0 to 1.0).
    pub utilization: f64,
    /// Number of items placed.
    pub items_placed: usize,
    /// Total number of items.
    pub total_items: usize,
    /// Number of pallets opened.
    pub pallets_used: usize,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
    /// Current phase description.
    pub phase: String,
    /// Whether the solver is still running.
    pub running: bool,
}

impl ProgressInfo {
    /// Creates a new progress info with default values.
    pub fn new() -> Self {
        Self {
            running: true,
            ..Default::default()
        }
    }

    /// Sets the iteration info.
    pub fn with_iteration(mut self, current: u32, total: u32) -> Self {
        self.iteration = current;
        self.total_iterations = total;
        self
    }

    /// Sets the utilization.
    pub fn with_utilization(mut self, utilization: f64) -> Self {
        self.utilization = utilization;
        self
    }

    /// Sets the items placed info.
    pub fn with_items(mut self, placed: usize, total: usize) -> Self {
        self.items_placed = placed;
        self.total_items = total;
        self
    }

    /// Sets the number of pallets in use.
    pub fn with_pallets(mut self, pallets: usize) -> Self {
        self.pallets_used = pallets;
        self
    }

    /// Sets the elapsed time.
    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// Sets the phase description.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    /// Marks the solver as finished.
    pub fn finished(mut self) -> Self {
        self.running = false;
        self
    }
}

/// Trait for packing solvers.
pub trait Solver {
    /// The item type this solver places.
    type Item;
    /// The container type items are placed into.
    type Container;
    /// The solved result.
    type Output;

    /// Solves the packing problem.
    fn solve(&self, items: &[Self::Item], container: &Self::Container) -> Result<Self::Output>;

    /// Solves with a progress callback.
    fn solve_with_progress(
        &self,
        items: &[Self::Item],
        container: &Self::Container,
        callback: ProgressCallback,
    ) -> Result<Self::Output>;

    /// Requests cancellation of an ongoing solve.
    fn cancel(&self);
}
