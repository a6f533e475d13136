//! Error types for the catalog doctor.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CatalogDoctorError>;

#[derive(Debug, Error)]
pub enum CatalogDoctorError {
    /// A surgery's preconditions are violated. This is caught at the
    /// scheduler boundary and turns the rid into an unfixable entry, it is
    /// never fatal for a scheduled run.
    #[error("cannot perform surgery: {reason}")]
    CannotPerformSurgery { reason: String },

    /// An auxiliary index of an unregistered kind was encountered while
    /// removing a rid. Silent partial removal is worse than failure, so
    /// this propagates to the caller.
    #[error("unhandled index type: {type_name}")]
    UnhandledIndexType { type_name: String },
}

impl CatalogDoctorError {
    pub(crate) fn cannot_perform(reason: impl Into<String>) -> Self {
        CatalogDoctorError::CannotPerformSurgery {
            reason: reason.into(),
        }
    }
}
