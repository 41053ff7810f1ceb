//! The Cart Ledger: ordered line items keyed by product, with pricing.
//!
//! Ledger operations never fail. Inputs are sanitised (discounts clamped,
//! non-positive quantities turned into removals) and persistence problems are
//! logged, leaving the in-memory list authoritative for the session.

use std::sync::Arc;

use storefront_core::{DiscountPercent, Money, ProductId, TAX_RATE, position_by_id};

use crate::line::{CartLine, LinePatch, ProductSnapshot};
use crate::store::{CartStore, InMemoryCartStore};

/// Shopping cart for the current session.
#[derive(Debug)]
pub struct CartLedger {
    lines: Vec<CartLine>,
    store: Arc<dyn CartStore>,
}

impl CartLedger {
    /// Open the ledger on `store`, rehydrating whatever the previous session
    /// persisted.
    ///
    /// A payload that cannot be read is logged and the session starts with an
    /// empty cart.
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        let lines = match store.load() {
            Ok(Some(lines)) => {
                let lines = sanitize(lines);
                tracing::debug!(lines = lines.len(), "cart rehydrated from store");
                lines
            }
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(error = ?err, "discarding unreadable persisted cart");
                Vec::new()
            }
        };

        Self { lines, store }
    }

    /// Ledger backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCartStore::new()))
    }

    /// Rebuild a ledger from a serialised line list and persist it to `store`.
    pub fn from_json(json: &str, store: Arc<dyn CartStore>) -> serde_json::Result<Self> {
        let lines: Vec<CartLine> = serde_json::from_str(json)?;
        let ledger = Self {
            lines: sanitize(lines),
            store,
        };
        ledger.persist();
        Ok(ledger)
    }

    /// Serialised form of the current lines (the persisted representation).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.lines)
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        position_by_id(&self.lines, &product_id).map(|idx| &self.lines[idx])
    }

    /// Discounted amount of one line, `None` when the product is not in the cart.
    pub fn line_total(&self, product_id: ProductId) -> Option<Money> {
        self.line(product_id).map(CartLine::line_total)
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.line(product_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Products currently in the cart, in line order.
    pub fn selected_products(&self) -> Vec<ProductId> {
        self.lines.iter().map(|l| l.product_id).collect()
    }

    /// Add one unit of `product`, creating the line if needed.
    pub fn add_or_increment(&mut self, product: &ProductSnapshot) {
        match position_by_id(&self.lines, &product.id) {
            Some(idx) => {
                let line = &mut self.lines[idx];
                line.quantity = line.quantity.saturating_add(1);
                tracing::debug!(product_id = %product.id, quantity = line.quantity, "cart line incremented");
            }
            None => {
                self.lines.push(CartLine::from_snapshot(product));
                tracing::debug!(product_id = %product.id, "cart line added");
            }
        }
        self.persist();
    }

    /// Apply a partial update to the line for `product_id`.
    ///
    /// A quantity `<= 0` removes the line; a discount is clamped to
    /// `[0, 100]`. Unknown products are ignored.
    pub fn update_line(&mut self, product_id: ProductId, patch: LinePatch) {
        if patch.is_removal() {
            self.remove_line(product_id);
            return;
        }

        let Some(idx) = position_by_id(&self.lines, &product_id) else {
            tracing::debug!(product_id = %product_id, "update for product not in cart ignored");
            return;
        };

        let line = &mut self.lines[idx];
        if let Some(quantity) = patch.quantity {
            line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
        if let Some(percent) = patch.discount_percent {
            line.discount_percent = DiscountPercent::clamped(percent);
        }
        tracing::debug!(
            product_id = %product_id,
            quantity = line.quantity,
            discount = %line.discount_percent.value(),
            "cart line updated"
        );
        self.persist();
    }

    /// Remove the line for `product_id`, if present.
    pub fn remove_line(&mut self, product_id: ProductId) {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() != before {
            tracing::debug!(product_id = %product_id, "cart line removed");
            self.persist();
        }
    }

    /// Empty the cart and its persisted copy.
    pub fn clear(&mut self) {
        self.lines.clear();
        tracing::debug!("cart cleared");
        self.persist();
    }

    /// `Σ unit_price × quantity × (1 − discount/100)` over all lines.
    pub fn compute_subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Tax on the discounted subtotal.
    pub fn compute_tax(&self) -> Money {
        tax_on(self.compute_subtotal())
    }

    pub fn compute_total(&self) -> Money {
        let subtotal = self.compute_subtotal();
        subtotal + tax_on(subtotal)
    }

    /// Write the whole list; an empty cart removes the persisted entry.
    fn persist(&self) {
        let result = if self.lines.is_empty() {
            self.store.clear()
        } else {
            self.store.save(&self.lines)
        };

        if let Err(err) = result {
            tracing::error!(error = ?err, "failed to persist cart");
        }
    }
}

/// Tax owed on an already-discounted amount.
pub fn tax_on(subtotal: Money) -> Money {
    subtotal.scale(TAX_RATE)
}

/// Re-establish ledger invariants on lines coming from outside (storage,
/// serialised snapshots): zero-quantity lines are dropped and duplicate
/// products are merged into the first occurrence.
fn sanitize(lines: Vec<CartLine>) -> Vec<CartLine> {
    let mut out: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            continue;
        }
        match out.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
            }
            None => out.push(line),
        }
    }
    out
}
