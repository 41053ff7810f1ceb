//! Identity of domain records.

/// Something with a stable identity across state changes.
///
/// A cart line is keyed by its product: two lines with the same product id
/// are the same line, whatever their quantity or discount. A customer is
/// keyed by its backend id.
pub trait Entity {
    type Id: Copy + Eq + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

/// Index of the entity identified by `id`.
pub fn position_by_id<E: Entity>(items: &[E], id: &E::Id) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}
