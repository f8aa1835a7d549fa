use super::customer::CustomerId;
use super::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type InvoiceId = u32;

/// Lifecycle of an invoice within a billing cycle.
///
/// `Pending` is the only state eligible for charging. The other three are
/// terminal for the cycle that reached them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Unpaid,
    Failed,
}

impl InvoiceStatus {
    /// Only a pending invoice may be settled, and only into a terminal state.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (
                InvoiceStatus::Pending,
                InvoiceStatus::Paid | InvoiceStatus::Unpaid | InvoiceStatus::Failed
            )
        )
    }

    pub fn is_terminal(self) -> bool {
        self != InvoiceStatus::Pending
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvoiceStatus::Pending => "PENDING",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Unpaid => "UNPAID",
            InvoiceStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub status: InvoiceStatus,
}

impl Invoice {
    pub fn new(id: InvoiceId, customer_id: CustomerId, amount: Money) -> Self {
        Self {
            id,
            customer_id,
            amount,
            status: InvoiceStatus::Pending,
        }
    }

    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvoiceStatus::Pending
    }
}
