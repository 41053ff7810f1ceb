use thiserror::Error;

use crate::ports::SubmissionError;

/// Preconditions checked before anything leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("select a customer before confirming")]
    NoCounterparty,

    #[error("the cart is empty")]
    EmptyCart,

    #[error("no checkout in progress")]
    NoCheckoutInProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot identify operator, please re-authenticate")]
    OperatorUnavailable,

    #[error("an invoice submission is already in progress")]
    AlreadySubmitting,

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}
