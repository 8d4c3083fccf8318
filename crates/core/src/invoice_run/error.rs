//! Invoice run error types.

use thiserror::Error;

use leasebill_shared::types::{InvoiceRunId, LeaseId};

use super::types::InvoiceRunStatus;
use crate::error::ErrorKind;

/// Errors that can occur while creating or advancing an invoice run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceRunError {
    /// Transition not allowed by the run state machine.
    #[error("Invalid invoice run status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: InvoiceRunStatus,
        /// Requested status.
        to: InvoiceRunStatus,
    },

    /// A lease was recorded twice in the same run.
    #[error("Lease {lease_id} already has an item in run {run_id}")]
    DuplicateItem {
        /// Run id.
        run_id: InvoiceRunId,
        /// Lease id.
        lease_id: LeaseId,
    },

    /// Items may only be recorded while Running.
    #[error("Run {run_id} is {status}, items can only be recorded while running")]
    NotRunning {
        /// Run id.
        run_id: InvoiceRunId,
        /// Current status.
        status: InvoiceRunStatus,
    },

    /// Utility runs need explicit period bounds.
    #[error("Utility invoice runs require a period end")]
    PeriodEndRequired,
}

impl InvoiceRunError {
    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PeriodEndRequired => ErrorKind::Validation,
            Self::InvalidTransition { .. } | Self::NotRunning { .. } => ErrorKind::BusinessRule,
            Self::DuplicateItem { .. } => ErrorKind::Conflict,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::DuplicateItem { .. } => "DUPLICATE_RUN_ITEM",
            Self::NotRunning { .. } => "RUN_NOT_RUNNING",
            Self::PeriodEndRequired => "PERIOD_END_REQUIRED",
        }
    }
}
