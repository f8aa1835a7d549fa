use super::customer::CustomerId;
use super::invoice::InvoiceId;
use thiserror::Error;

/// A failed charge attempt as reported by the payment gateway.
///
/// A decline is not a failure: the gateway answers `Ok(false)` for that.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChargeError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Customer '{0}' was not found")]
    CustomerNotFound(CustomerId),
    #[error("Currency of invoice '{invoice_id}' does not match customer '{customer_id}'")]
    CurrencyMismatch {
        invoice_id: InvoiceId,
        customer_id: CustomerId,
    },
    #[error("Charge failed: {0}")]
    Other(String),
}

/// The cause of a failed charge, reduced to what the billing pipeline acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Network,
    InvalidCustomer,
    CurrencyMismatch,
    Unknown,
}

impl FailureKind {
    pub fn is_transient(self) -> bool {
        self == FailureKind::Network
    }
}

impl ChargeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ChargeError::Network(_) => FailureKind::Network,
            ChargeError::CustomerNotFound(_) => FailureKind::InvalidCustomer,
            ChargeError::CurrencyMismatch { .. } => FailureKind::CurrencyMismatch,
            ChargeError::Other(_) => FailureKind::Unknown,
        }
    }
}
