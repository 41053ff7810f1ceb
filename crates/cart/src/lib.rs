//! Cart Ledger: the session's shopping cart and its pricing rules.
//!
//! This crate owns the line items, the discount-before-tax arithmetic and the
//! persistence contract (`CartStore`). It performs no network IO.

pub mod ledger;
pub mod line;
pub mod store;

pub use ledger::CartLedger;
pub use line::{CartLine, LinePatch, ProductSnapshot};
pub use store::{CART_STORAGE_KEY, CartStore, FileCartStore, InMemoryCartStore};
