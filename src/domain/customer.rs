use super::money::Currency;
use serde::{Deserialize, Serialize};

pub type CustomerId = u32;

/// A billable customer and the currency their payment method settles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub currency: Currency,
}

impl Customer {
    pub fn new(id: CustomerId, currency: Currency) -> Self {
        Self { id, currency }
    }
}
