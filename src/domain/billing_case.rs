use super::failure::FailureKind;
use super::invoice::InvoiceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an invoice could not be billed, as seen by the case tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingCaseCategory {
    InvalidCustomer,
    CurrencyMismatch,
    Unknown,
}

impl From<FailureKind> for BillingCaseCategory {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::InvalidCustomer => BillingCaseCategory::InvalidCustomer,
            FailureKind::CurrencyMismatch => BillingCaseCategory::CurrencyMismatch,
            FailureKind::Network | FailureKind::Unknown => BillingCaseCategory::Unknown,
        }
    }
}

impl fmt::Display for BillingCaseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BillingCaseCategory::InvalidCustomer => "INVALID_CUSTOMER",
            BillingCaseCategory::CurrencyMismatch => "CURRENCY_MISMATCH",
            BillingCaseCategory::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Handed to the case handler once per failed invoice. Not persisted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCaseEvent {
    pub invoice_id: InvoiceId,
    pub category: BillingCaseCategory,
}

impl BillingCaseEvent {
    pub fn new(invoice_id: InvoiceId, category: BillingCaseCategory) -> Self {
        Self {
            invoice_id,
            category,
        }
    }
}
