//! Checkout state machine.
//!
//! `Idle → AwaitingCounterparty → Submitting → Completed | Failed`, with
//! `Failed` able to return to `AwaitingCounterparty` (new selection) or to
//! `Submitting` (retry). The state lock is never held across the submitter
//! await; re-entrant confirms observe `Submitting` and are rejected.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use storefront_cart::CartLedger;

use crate::customer::Customer;
use crate::error::{CheckoutError, ValidationError};
use crate::ports::{InvoiceSubmitter, OperatorResolver, SubmissionError};
use crate::request::{CheckoutOptions, CheckoutRequest, InvoiceConfirmation, InvoiceSubmission};

/// The session's cart, shared between the UI layer and the orchestrator.
pub type SharedCart = Arc<tokio::sync::Mutex<CartLedger>>;

/// Externally visible phase of the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutPhase {
    Idle,
    AwaitingCounterparty,
    Submitting,
    Completed,
    Failed,
}

#[derive(Debug)]
enum CheckoutState {
    Idle,
    AwaitingCounterparty {
        request: CheckoutRequest,
        selection: Option<Customer>,
    },
    Submitting {
        request: CheckoutRequest,
        selection: Customer,
    },
    Completed {
        confirmation: InvoiceConfirmation,
    },
    Failed {
        request: CheckoutRequest,
        selection: Customer,
        error: SubmissionError,
    },
}

impl CheckoutState {
    fn phase(&self) -> CheckoutPhase {
        match self {
            CheckoutState::Idle => CheckoutPhase::Idle,
            CheckoutState::AwaitingCounterparty { .. } => CheckoutPhase::AwaitingCounterparty,
            CheckoutState::Submitting { .. } => CheckoutPhase::Submitting,
            CheckoutState::Completed { .. } => CheckoutPhase::Completed,
            CheckoutState::Failed { .. } => CheckoutPhase::Failed,
        }
    }

    fn request(&self) -> Option<&CheckoutRequest> {
        match self {
            CheckoutState::AwaitingCounterparty { request, .. }
            | CheckoutState::Submitting { request, .. }
            | CheckoutState::Failed { request, .. } => Some(request),
            CheckoutState::Idle | CheckoutState::Completed { .. } => None,
        }
    }

    fn selection(&self) -> Option<&Customer> {
        match self {
            CheckoutState::AwaitingCounterparty { selection, .. } => selection.as_ref(),
            CheckoutState::Submitting { selection, .. } | CheckoutState::Failed { selection, .. } => {
                Some(selection)
            }
            CheckoutState::Idle | CheckoutState::Completed { .. } => None,
        }
    }
}

/// Returns an abandoned `Submitting` state to `AwaitingCounterparty`.
///
/// Armed for the duration of the submitter await. If the confirm future is
/// dropped mid-flight the checkout becomes retryable instead of staying stuck
/// in `Submitting`.
struct SubmittingGuard<'a> {
    state: &'a Mutex<CheckoutState>,
    armed: bool,
}

impl<'a> SubmittingGuard<'a> {
    fn arm(state: &'a Mutex<CheckoutState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock(self.state);
        if let CheckoutState::Submitting { request, selection } =
            mem::replace(&mut *state, CheckoutState::Idle)
        {
            warn!(checkout_id = %request.id, "confirm abandoned while submitting");
            *state = CheckoutState::AwaitingCounterparty {
                request,
                selection: Some(selection),
            };
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Empties the cart if a completed checkout still owes it a clear.
fn settle_pending_clear(pending: &AtomicBool, cart: &mut CartLedger) {
    if pending.swap(false, Ordering::SeqCst) {
        cart.clear();
    }
}

/// Makes the post-submission cart clear survive a dropped `confirm` future.
///
/// If the future is abandoned while waiting for the cart lock, the clear is
/// handed to a background task that takes the lock once it is free.
struct PendingCartClear {
    cart: SharedCart,
    pending: Arc<AtomicBool>,
}

impl PendingCartClear {
    fn arm(cart: &SharedCart, pending: &Arc<AtomicBool>) -> Self {
        pending.store(true, Ordering::SeqCst);
        Self {
            cart: Arc::clone(cart),
            pending: Arc::clone(pending),
        }
    }
}

impl Drop for PendingCartClear {
    fn drop(&mut self) {
        if !self.pending.load(Ordering::SeqCst) {
            return;
        }
        if let Ok(mut cart) = self.cart.try_lock() {
            settle_pending_clear(&self.pending, &mut cart);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("confirm dropped before clearing cart; deferring clear");
                let cart = Arc::clone(&self.cart);
                let pending = Arc::clone(&self.pending);
                handle.spawn(async move {
                    let mut cart = cart.lock().await;
                    settle_pending_clear(&pending, &mut cart);
                });
            }
            Err(_) => {
                warn!("confirm dropped outside a runtime; cart clear left to the next checkout");
            }
        }
    }
}

/// Sequences snapshot, counterparty selection and invoice submission for
/// the session's cart.
pub struct CheckoutOrchestrator {
    cart: SharedCart,
    submitter: Arc<dyn InvoiceSubmitter>,
    operator: Arc<dyn OperatorResolver>,
    options: Mutex<CheckoutOptions>,
    state: Mutex<CheckoutState>,
    clear_pending: Arc<AtomicBool>,
}

impl core::fmt::Debug for CheckoutOrchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CheckoutOrchestrator")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl CheckoutOrchestrator {
    pub fn new(
        cart: SharedCart,
        submitter: Arc<dyn InvoiceSubmitter>,
        operator: Arc<dyn OperatorResolver>,
    ) -> Self {
        Self {
            cart,
            submitter,
            operator,
            options: Mutex::new(CheckoutOptions::default()),
            state: Mutex::new(CheckoutState::Idle),
            clear_pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cart(&self) -> SharedCart {
        Arc::clone(&self.cart)
    }

    pub fn phase(&self) -> CheckoutPhase {
        lock(&self.state).phase()
    }

    /// Frozen snapshot of the checkout in progress.
    pub fn request(&self) -> Option<CheckoutRequest> {
        lock(&self.state).request().cloned()
    }

    pub fn selection(&self) -> Option<Customer> {
        lock(&self.state).selection().cloned()
    }

    /// Error of the last failed submission, while in `Failed`.
    pub fn last_error(&self) -> Option<SubmissionError> {
        match &*lock(&self.state) {
            CheckoutState::Failed { error, .. } => Some(error.clone()),
            _ => None,
        }
    }

    /// Confirmation of the last completed checkout, while in `Completed`.
    pub fn confirmation(&self) -> Option<InvoiceConfirmation> {
        match &*lock(&self.state) {
            CheckoutState::Completed { confirmation } => Some(confirmation.clone()),
            _ => None,
        }
    }

    pub fn options(&self) -> CheckoutOptions {
        lock(&self.options).clone()
    }

    pub fn set_options(&self, options: CheckoutOptions) {
        *lock(&self.options) = options;
    }

    /// Snapshot the cart and wait for a counterparty.
    ///
    /// Replaces any previous snapshot (and selection) unless a submission is
    /// in flight.
    pub async fn begin_checkout(&self) -> Result<CheckoutRequest, CheckoutError> {
        self.ensure_not_submitting()?;

        let request = {
            let mut cart = self.cart.lock().await;
            settle_pending_clear(&self.clear_pending, &mut cart);
            if cart.is_empty() {
                return Err(ValidationError::EmptyCart.into());
            }
            CheckoutRequest::snapshot(&cart)
        };

        let mut state = lock(&self.state);
        if matches!(*state, CheckoutState::Submitting { .. }) {
            return Err(CheckoutError::AlreadySubmitting);
        }
        info!(
            checkout_id = %request.id,
            lines = request.lines.len(),
            total = %request.total.amount(),
            "checkout started"
        );
        *state = CheckoutState::AwaitingCounterparty {
            request: request.clone(),
            selection: None,
        };
        Ok(request)
    }

    /// Record the customer the invoice is issued to. Last selection wins.
    pub fn select_counterparty(&self, customer: Customer) -> Result<(), CheckoutError> {
        let mut state = lock(&self.state);
        match mem::replace(&mut *state, CheckoutState::Idle) {
            CheckoutState::AwaitingCounterparty { request, .. }
            | CheckoutState::Failed { request, .. } => {
                debug!(checkout_id = %request.id, customer_id = %customer.id, "counterparty selected");
                *state = CheckoutState::AwaitingCounterparty {
                    request,
                    selection: Some(customer),
                };
                Ok(())
            }
            other => {
                let err = match other {
                    CheckoutState::Submitting { .. } => CheckoutError::AlreadySubmitting,
                    _ => ValidationError::NoCheckoutInProgress.into(),
                };
                *state = other;
                Err(err)
            }
        }
    }

    /// Submit the frozen snapshot as an invoice.
    ///
    /// On success the cart is cleared and the confirmation returned. On
    /// failure the snapshot, selection and cart are kept and the checkout
    /// can be confirmed again.
    pub async fn confirm(&self) -> Result<InvoiceConfirmation, CheckoutError> {
        let submission = self.start_submission()?;
        let guard = SubmittingGuard::arm(&self.state);

        let outcome = self.submitter.submit(&submission).await;

        match outcome {
            Ok(confirmation) => {
                guard.disarm();
                let clear = PendingCartClear::arm(&self.cart, &self.clear_pending);
                *lock(&self.state) = CheckoutState::Completed {
                    confirmation: confirmation.clone(),
                };
                *lock(&self.options) = CheckoutOptions::default();
                settle_pending_clear(&self.clear_pending, &mut *self.cart.lock().await);
                drop(clear);
                info!(
                    checkout_id = %submission.checkout_id,
                    invoice_number = %confirmation.invoice_number,
                    "checkout completed"
                );
                Ok(confirmation)
            }
            Err(err) => {
                guard.disarm();
                let mut state = lock(&self.state);
                if let CheckoutState::Submitting { request, selection } =
                    mem::replace(&mut *state, CheckoutState::Idle)
                {
                    *state = CheckoutState::Failed {
                        request,
                        selection,
                        error: err.clone(),
                    };
                }
                error!(
                    checkout_id = %submission.checkout_id,
                    status = ?err.status,
                    error = %err,
                    "invoice submission failed"
                );
                Err(err.into())
            }
        }
    }

    /// Abandon the checkout in progress. The cart is left untouched.
    pub fn cancel(&self) -> Result<(), CheckoutError> {
        let mut state = lock(&self.state);
        match &*state {
            CheckoutState::Submitting { .. } => Err(CheckoutError::AlreadySubmitting),
            CheckoutState::Idle | CheckoutState::Completed { .. } => Ok(()),
            CheckoutState::AwaitingCounterparty { request, .. }
            | CheckoutState::Failed { request, .. } => {
                info!(checkout_id = %request.id, "checkout cancelled");
                *state = CheckoutState::Idle;
                Ok(())
            }
        }
    }

    /// Abandon the checkout and empty the cart.
    pub async fn cancel_and_clear(&self) -> Result<(), CheckoutError> {
        self.cancel()?;
        let mut cart = self.cart.lock().await;
        settle_pending_clear(&self.clear_pending, &mut cart);
        cart.clear();
        Ok(())
    }

    fn ensure_not_submitting(&self) -> Result<(), CheckoutError> {
        match *lock(&self.state) {
            CheckoutState::Submitting { .. } => Err(CheckoutError::AlreadySubmitting),
            _ => Ok(()),
        }
    }

    /// Validate preconditions, build the submission and enter `Submitting`,
    /// all under one state lock.
    fn start_submission(&self) -> Result<InvoiceSubmission, CheckoutError> {
        let mut state = lock(&self.state);

        let (request, selection) = match &*state {
            CheckoutState::Submitting { .. } => return Err(CheckoutError::AlreadySubmitting),
            CheckoutState::Idle | CheckoutState::Completed { .. } => {
                return Err(ValidationError::NoCheckoutInProgress.into());
            }
            CheckoutState::AwaitingCounterparty { request, selection } => {
                (request, selection.as_ref())
            }
            CheckoutState::Failed { request, selection, .. } => (request, Some(selection)),
        };

        let Some(customer) = selection else {
            return Err(ValidationError::NoCounterparty.into());
        };

        let Some(employee_id) = self.operator.resolve_operator() else {
            error!(checkout_id = %request.id, "operator could not be resolved");
            return Err(CheckoutError::OperatorUnavailable);
        };

        let options = lock(&self.options).clone();
        let submission = InvoiceSubmission::build(request, customer.id, employee_id, &options);

        info!(
            checkout_id = %request.id,
            customer_id = %customer.id,
            employee_id = %employee_id,
            "submitting invoice"
        );
        let next = CheckoutState::Submitting {
            request: request.clone(),
            selection: customer.clone(),
        };
        *state = next;
        Ok(submission)
    }
}
