//! `storefront-core`: shared building blocks for the cart and checkout crates.
//!
//! This crate contains **pure domain** primitives (no IO, no HTTP, no storage).

pub mod entity;
pub mod error;
pub mod format;
pub mod id;
pub mod money;

pub use entity::{Entity, position_by_id};
pub use error::{DomainError, DomainResult};
pub use format::format_cop;
pub use id::{CheckoutId, CustomerId, EmployeeId, ProductId};
pub use money::{DiscountPercent, Money, TAX_RATE};
