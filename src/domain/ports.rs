use super::billing_case::BillingCaseEvent;
use super::customer::CustomerId;
use super::failure::ChargeError;
use super::invoice::{Invoice, InvoiceId, InvoiceStatus};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait InvoiceSource: Send + Sync {
    async fn fetch_pending(&self) -> Result<Vec<Invoice>>;
    async fn update_status(&self, invoice_id: InvoiceId, status: InvoiceStatus) -> Result<()>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `Ok(true)` when charged, `Ok(false)` when the charge was declined.
    async fn charge(&self, invoice: &Invoice) -> std::result::Result<bool, ChargeError>;
}

#[async_trait]
pub trait CustomerNotifier: Send + Sync {
    async fn notify(&self, customer_id: CustomerId, message: &str) -> Result<()>;
}

#[async_trait]
pub trait BillingCaseHandler: Send + Sync {
    async fn handle(&self, event: BillingCaseEvent) -> Result<()>;
}

/// Internal alert raised when an invoice could not be charged for
/// infrastructure reasons and was left for the next cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpsAlert {
    pub invoice_id: InvoiceId,
    pub attempts: u32,
    pub reason: String,
}

#[async_trait]
pub trait OpsAlerter: Send + Sync {
    async fn alert(&self, alert: OpsAlert) -> Result<()>;
}

pub type InvoiceSourceRef = Arc<dyn InvoiceSource>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type CustomerNotifierRef = Arc<dyn CustomerNotifier>;
pub type BillingCaseHandlerRef = Arc<dyn BillingCaseHandler>;
pub type OpsAlerterRef = Arc<dyn OpsAlerter>;
