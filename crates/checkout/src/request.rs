use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_cart::{CartLedger, CartLine};
use storefront_core::{CheckoutId, CustomerId, EmployeeId, Money, ProductId};

/// Cart contents frozen at "proceed to checkout".
///
/// Later cart mutation does not reach this value; submission is always built
/// from these lines and totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub id: CheckoutId,
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub total: Money,
    pub taken_at: DateTime<Utc>,
}

impl CheckoutRequest {
    pub fn snapshot(cart: &CartLedger) -> Self {
        Self {
            id: CheckoutId::new(),
            lines: cart.lines().to_vec(),
            subtotal: cart.compute_subtotal(),
            tax_amount: cart.compute_tax(),
            total: cart.compute_total(),
            taken_at: Utc::now(),
        }
    }

    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "EFECTIVO")]
    Cash,
    #[serde(rename = "TARJETA")]
    Card,
    #[serde(rename = "TRANSFERENCIA")]
    Transfer,
}

impl PaymentMethod {
    pub fn as_wire(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "EFECTIVO",
            PaymentMethod::Card => "TARJETA",
            PaymentMethod::Transfer => "TRANSFERENCIA",
        }
    }
}

/// Invoice-level choices made on the checkout screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutOptions {
    pub payment_method: PaymentMethod,
    discount: Money,
    pub notes: String,
}

impl CheckoutOptions {
    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    /// Aggregate invoice discount; negative amounts become zero.
    pub fn with_discount(mut self, amount: Decimal) -> Self {
        self.discount = Money::saturating(amount);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn discount(&self) -> Money {
        self.discount
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub discount_percent: Decimal,
}

/// What leaves the process on confirm. Monetary fields are already rounded
/// to cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceSubmission {
    pub checkout_id: CheckoutId,
    pub customer_id: CustomerId,
    pub employee_id: EmployeeId,
    pub payment_method: PaymentMethod,
    pub tax: Decimal,
    pub discount: Decimal,
    pub notes: String,
    pub lines: Vec<SubmissionLine>,
}

impl InvoiceSubmission {
    pub fn build(
        request: &CheckoutRequest,
        customer_id: CustomerId,
        employee_id: EmployeeId,
        options: &CheckoutOptions,
    ) -> Self {
        let lines = request
            .lines
            .iter()
            .map(|line| SubmissionLine {
                product_id: line.product_id,
                quantity: line.quantity,
                discount_percent: line.discount_percent.value(),
            })
            .collect();

        Self {
            checkout_id: request.id,
            customer_id,
            employee_id,
            payment_method: options.payment_method,
            tax: request.tax_amount.rounded_cents(),
            discount: options.discount().rounded_cents(),
            notes: options.notes.clone(),
            lines,
        }
    }
}

/// Backend acknowledgement of a finalised sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceConfirmation {
    pub invoice_number: String,
}

impl InvoiceConfirmation {
    pub fn new(invoice_number: impl Into<String>) -> Self {
        Self {
            invoice_number: invoice_number.into(),
        }
    }
}
