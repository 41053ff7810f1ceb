//! Display formatting for Colombian pesos.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::money::Money;

/// Format an amount the way the storefront displays prices: whole pesos,
/// `.` as thousands separator, `$ ` prefix (e.g. `$ 1.234.567`).
pub fn format_cop(amount: Money) -> String {
    let whole = amount
        .amount()
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .trunc();
    format!("$ {}", group_thousands(whole))
}

fn group_thousands(value: Decimal) -> String {
    let digits = value.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}
