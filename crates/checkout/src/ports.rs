//! Outbound ports of the orchestrator.

use async_trait::async_trait;
use thiserror::Error;

use storefront_core::EmployeeId;

use crate::request::{InvoiceConfirmation, InvoiceSubmission};

/// Message shown when the backend gave no usable explanation.
pub const FALLBACK_SUBMISSION_MESSAGE: &str = "Error al procesar la venta. Intente nuevamente.";

/// Remote rejection or transport failure of an invoice submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SubmissionError {
    /// HTTP status when the backend answered; `None` for transport failures.
    pub status: Option<u16>,
    pub message: String,
}

impl SubmissionError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn fallback(status: Option<u16>) -> Self {
        Self::new(status, FALLBACK_SUBMISSION_MESSAGE)
    }
}

/// Sends a finished invoice to the backend.
#[async_trait]
pub trait InvoiceSubmitter: Send + Sync {
    async fn submit(
        &self,
        submission: &InvoiceSubmission,
    ) -> Result<InvoiceConfirmation, SubmissionError>;
}

/// Identifies the employee operating the register.
pub trait OperatorResolver: Send + Sync {
    fn resolve_operator(&self) -> Option<EmployeeId>;
}

impl OperatorResolver for Option<EmployeeId> {
    fn resolve_operator(&self) -> Option<EmployeeId> {
        *self
    }
}
