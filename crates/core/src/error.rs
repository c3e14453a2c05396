//! Error types for the pallet piler.

use thiserror::Error;

/// Result type alias for pallet piler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating or packing a job.
///
/// Feasibility rejections are not errors: a candidate that does not fit is an
/// expected outcome and is reported through the packing result instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed item, pallet or box dimensions.
    #[error("Invalid geometry for '{subject}': {field} {reason}")]
    InvalidGeometry {
        /// Item id, `"pallet"` or `"box"`.
        subject: String,
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Two items in one job share an identifier.
    #[error("Duplicate item id: {0}")]
    DuplicateItem(String),

    /// A placement references an item the catalog does not know.
    #[error("Unknown item id: {0}")]
    UnknownItem(String),

    /// A placement was committed that the feasibility checker rejects.
    ///
    /// This signals a bug in the engine. It aborts the current job only.
    #[error("Invalid placement of '{item}' on pallet {pallet}: {reason}")]
    InvalidPlacement {
        /// Item id of the rejected placement.
        item: String,
        /// Pallet index of the rejected placement.
        pallet: usize,
        /// Rejection cause.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The session was sealed and can no longer be mutated.
    #[error("Session is sealed")]
    SessionSealed,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Builds an [`Error::InvalidGeometry`] for a value that must be strictly positive.
    pub fn non_positive(subject: impl Into<String>, field: &'static str, value: f64) -> Self {
        Self::InvalidGeometry {
            subject: subject.into(),
            field,
            reason: format!("must be positive and finite, got {value}"),
        }
    }

    /// Returns true for errors raised while validating job input.
    pub fn is_intake_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidGeometry { .. }
                | Self::DuplicateItem(_)
                | Self::UnknownItem(_)
                | Self::ConfigError(_)
        )
    }
}
