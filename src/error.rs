//! Crate-wide error taxonomy.
//!
//! Each component boundary gets its own error enum; [`PhaseError`] composes
//! them for the reconciliation phases, and is what the driver loop logs per
//! tick on failure.

use crate::customcheck::CustomCheckError;
use crate::filter::FilterError;
use crate::inventory::InventoryError;
use crate::monitoring::MonitoringError;
use crate::template::TemplateError;

/// Errors that abort the current phase but never the process.
#[derive(thiserror::Error, Debug)]
pub enum PhaseError {
    #[error("inventory request failed: {0}")]
    Inventory(#[from] InventoryError),
    #[error("monitoring backend request failed: {0}")]
    Monitoring(#[from] MonitoringError),
    #[error("custom check payload invalid: {0}")]
    CustomCheck(#[from] CustomCheckError),
    #[error("name template failed to render: {0}")]
    Template(#[from] TemplateError),
    #[error("filter expression invalid: {0}")]
    Filter(#[from] FilterError),
}
