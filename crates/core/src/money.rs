//! Money and percentage value objects.
//!
//! All arithmetic is decimal and keeps full precision. Rounding happens only
//! at display ([`crate::format_cop`]) and submission ([`Money::rounded_cents`])
//! boundaries.

use core::iter::Sum;
use core::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Sales tax (IVA) applied once on the discounted subtotal.
pub const TAX_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 2);

/// A non-negative amount in the store's single currency (COP).
///
/// Deserialisation saturates negative amounts to zero, like [`Money::saturating`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Build an amount, rejecting negative values.
    pub fn try_new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::validation(format!(
                "amount must not be negative (got {amount})"
            )));
        }
        Ok(Self(amount))
    }

    /// Build an amount, clamping negative values to zero.
    pub fn saturating(amount: Decimal) -> Self {
        Self(amount.max(Decimal::ZERO))
    }

    pub fn from_units(units: i64) -> Self {
        Self::saturating(Decimal::from(units))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by a non-negative factor (quantity, rate, discount factor).
    pub fn scale(self, factor: Decimal) -> Self {
        Self::saturating(self.0.saturating_mul(factor))
    }

    /// Amount rounded to two decimal places, half away from zero.
    ///
    /// This is the precision of the backend's monetary columns.
    pub fn rounded_cents(&self) -> Decimal {
        self.0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self::saturating(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

/// A per-line discount in percent, always within `[0, 100]`.
///
/// Out-of-range input is clamped, never rejected. Deserialisation clamps as
/// well, so a tampered persisted cart cannot smuggle in a 150% discount.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    pub const NONE: DiscountPercent = DiscountPercent(Decimal::ZERO);

    pub fn clamped(value: Decimal) -> Self {
        Self(value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Multiplier applied to a gross line amount: `1 - percent / 100`.
    pub fn factor(&self) -> Decimal {
        Decimal::ONE - self.0 / Decimal::ONE_HUNDRED
    }
}

impl From<Decimal> for DiscountPercent {
    fn from(value: Decimal) -> Self {
        Self::clamped(value)
    }
}

impl From<DiscountPercent> for Decimal {
    fn from(value: DiscountPercent) -> Self {
        value.0
    }
}
