use crate::domain::invoice::{InvoiceId, InvoiceStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Configuration source error: {0}")]
    SettingsError(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("Invoice '{0}' was not found")]
    InvoiceNotFound(InvoiceId),
    #[error("Invoice '{id}' cannot move from {from} to {to}")]
    InvalidTransition {
        id: InvoiceId,
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
    #[error("Billing worker failed: {0}")]
    WorkerError(String),
}

pub type Result<T> = std::result::Result<T, BillingError>;
