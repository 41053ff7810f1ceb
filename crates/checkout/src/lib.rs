//! Checkout Orchestrator: turns the cart into a submitted invoice.
//!
//! The flow is an explicit state machine
//! (`Idle → AwaitingCounterparty → Submitting → Completed | Failed`).
//! External effects go through two ports: [`InvoiceSubmitter`] (the backend
//! invoice endpoint) and [`OperatorResolver`] (the authenticated session).

pub mod customer;
pub mod error;
pub mod orchestrator;
pub mod ports;
pub mod request;

pub use customer::{Customer, filter_customers};
pub use error::{CheckoutError, ValidationError};
pub use orchestrator::{CheckoutOrchestrator, CheckoutPhase, SharedCart};
pub use ports::{FALLBACK_SUBMISSION_MESSAGE, InvoiceSubmitter, OperatorResolver, SubmissionError};
pub use request::{
    CheckoutOptions, CheckoutRequest, InvoiceConfirmation, InvoiceSubmission, PaymentMethod,
    SubmissionLine,
};
