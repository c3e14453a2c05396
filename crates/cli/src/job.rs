//! Job file and response types.

use pallet_piler::core::{ImprovementBudget, OrderingKey, PackConfig};
use pallet_piler::pack::{Item, PalletSpec, Report};
use serde::{Deserialize, Serialize};

/// Version of this tool, reported in every response.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A loading job read from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Version the job was written for.
    #[serde(default)]
    pub version: Option<String>,

    /// Pallet shared by every pallet of the job.
    pub pallet: PalletSpec,

    /// Items to load.
    pub items: Vec<Item>,

    /// Configuration overrides.
    #[serde(default)]
    pub config: Option<ConfigOverrides>,
}

/// Partial configuration; unset fields keep the value underneath.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    /// Minimum supported fraction of an item's base.
    pub min_support_fraction: Option<f64>,

    /// Whether more than one pallet may be used.
    pub allow_multiple_pallets: Option<bool>,

    /// Upper bound on pallets.
    pub max_pallets: Option<usize>,

    /// Improvement iterations (0 disables the pass).
    pub improvement_iterations: Option<u32>,

    /// Extra time limit for the improvement pass in milliseconds.
    pub improvement_time_limit_ms: Option<u64>,

    /// Priority order of the units.
    pub ordering_key: Option<OrderingKey>,

    /// Global time limit in milliseconds.
    pub time_limit_ms: Option<u64>,

    /// Exhaustive order search threshold.
    pub exhaustive_max_items: Option<usize>,

    /// Forbid placing an item on a lighter one.
    pub forbid_heavier_on_lighter: Option<bool>,
}

impl ConfigOverrides {
    /// Applies the set fields on top of `config`.
    pub fn apply(&self, mut config: PackConfig) -> PackConfig {
        if let Some(v) = self.min_support_fraction {
            config = config.with_min_support_fraction(v);
        }
        if let Some(v) = self.allow_multiple_pallets {
            config = config.with_multiple_pallets(v);
        }
        if let Some(v) = self.max_pallets {
            config = config.with_max_pallets(v);
        }
        if self.improvement_iterations.is_some() || self.improvement_time_limit_ms.is_some() {
            let current = config.improvement;
            let budget = ImprovementBudget {
                max_iterations: self
                    .improvement_iterations
                    .unwrap_or(current.max_iterations),
                time_limit_ms: self
                    .improvement_time_limit_ms
                    .unwrap_or(current.time_limit_ms),
            };
            config = config.with_improvement(budget);
        }
        if let Some(v) = self.ordering_key {
            config = config.with_ordering_key(v);
        }
        if let Some(v) = self.time_limit_ms {
            config = config.with_time_limit(v);
        }
        if let Some(v) = self.exhaustive_max_items {
            config = config.with_exhaustive_max_items(v);
        }
        if let Some(v) = self.forbid_heavier_on_lighter {
            config = config.with_forbid_heavier_on_lighter(v);
        }
        config
    }
}

impl JobRequest {
    /// Resolves the configuration: defaults, then the job's block, then `flags`.
    pub fn resolve_config(&self, flags: &ConfigOverrides) -> PackConfig {
        let base = match &self.config {
            Some(job) => job.apply(PackConfig::default()),
            None => PackConfig::default(),
        };
        flags.apply(base)
    }
}

/// Response written for every job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    /// Tool version.
    pub version: String,

    /// Whether the job was accepted and packed.
    pub success: bool,

    /// Error message if the job failed.
    pub error: Option<String>,

    /// Loading plan, present on success.
    pub report: Option<Report>,

    /// Computation time in milliseconds.
    pub computation_time_ms: u64,
}

impl JobResponse {
    /// Successful response.
    pub fn success(report: Report, computation_time_ms: u64) -> Self {
        Self {
            version: API_VERSION.to_string(),
            success: true,
            error: None,
            report: Some(report),
            computation_time_ms,
        }
    }

    /// Failed response.
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            version: API_VERSION.to_string(),
            success: false,
            error: Some(msg.into()),
            report: None,
            computation_time_ms: 0,
        }
    }
}
