use serde::{Deserialize, Serialize};

use storefront_core::{CustomerId, Entity};

/// Counterparty the invoice is issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    /// National id / tax document. Empty when the backend did not send one.
    pub document_id: String,
    pub phone: Option<String>,
}

impl Customer {
    /// `"{first} {last}"`, trimmed when either part is missing.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    fn matches(&self, needle: &str) -> bool {
        self.full_name().to_lowercase().contains(needle)
            || self.document_id.to_lowercase().contains(needle)
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Case-insensitive match on full name, or substring match on the document id.
///
/// An empty query returns every customer.
pub fn filter_customers<'a>(customers: &'a [Customer], query: &str) -> Vec<&'a Customer> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return customers.iter().collect();
    }
    customers.iter().filter(|c| c.matches(&needle)).collect()
}
