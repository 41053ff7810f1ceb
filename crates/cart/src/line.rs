use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{DiscountPercent, Entity, Money, ProductId};

/// Product as read from the catalog at the moment it is added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub sale_price: Money,
    /// Stock reported by the catalog, if any.
    pub stock: Option<i64>,
}

/// One product's presence in the cart.
///
/// `unit_price` is frozen at add time; `available_stock` is informational and
/// never re-checked against live inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    #[serde(default)]
    pub discount_percent: DiscountPercent,
    #[serde(default)]
    pub available_stock: Option<i64>,
}

impl CartLine {
    /// New line for a product: quantity 1, no discount.
    pub fn from_snapshot(product: &ProductSnapshot) -> Self {
        Self {
            product_id: product.id,
            code: product.code.clone(),
            name: product.name.clone(),
            unit_price: product.sale_price,
            quantity: 1,
            discount_percent: DiscountPercent::NONE,
            available_stock: product.stock,
        }
    }

    /// Gross amount before discount: `unit_price × quantity`.
    pub fn gross_amount(&self) -> Money {
        self.unit_price.scale(Decimal::from(self.quantity))
    }

    /// Discounted amount: `unit_price × quantity × (1 − discount/100)`.
    pub fn line_total(&self) -> Money {
        self.gross_amount().scale(self.discount_percent.factor())
    }
}

impl Entity for CartLine {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }
}

/// Partial update for a cart line.
///
/// `quantity` is signed on purpose: a value `<= 0` means "remove the line".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinePatch {
    pub quantity: Option<i64>,
    pub discount_percent: Option<Decimal>,
}

impl LinePatch {
    pub fn quantity(quantity: i64) -> Self {
        Self {
            quantity: Some(quantity),
            discount_percent: None,
        }
    }

    pub fn discount(percent: Decimal) -> Self {
        Self {
            quantity: None,
            discount_percent: Some(percent),
        }
    }

    pub fn with_discount(mut self, percent: Decimal) -> Self {
        self.discount_percent = Some(percent);
        self
    }

    /// Whether applying this patch removes the line.
    pub fn is_removal(&self) -> bool {
        matches!(self.quantity, Some(q) if q <= 0)
    }
}
