//! Collaborators that only log, for local runs without real messaging,
//! case tracking or paging systems behind them.

use crate::domain::billing_case::BillingCaseEvent;
use crate::domain::customer::CustomerId;
use crate::domain::ports::{BillingCaseHandler, CustomerNotifier, OpsAlert, OpsAlerter};
use crate::error::Result;
use async_trait::async_trait;

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl CustomerNotifier for LoggingNotifier {
    async fn notify(&self, customer_id: CustomerId, message: &str) -> Result<()> {
        tracing::info!(target: "billrun::notifications", customer_id, text = message, "Customer notified");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCaseHandler;

#[async_trait]
impl BillingCaseHandler for LoggingCaseHandler {
    async fn handle(&self, event: BillingCaseEvent) -> Result<()> {
        tracing::info!(
            target: "billrun::cases",
            invoice_id = event.invoice_id,
            category = %event.category,
            "Billing case created"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingOpsAlerter;

#[async_trait]
impl OpsAlerter for LoggingOpsAlerter {
    async fn alert(&self, alert: OpsAlert) -> Result<()> {
        tracing::error!(
            target: "billrun::ops",
            invoice_id = alert.invoice_id,
            attempts = alert.attempts,
            reason = %alert.reason,
            "Operations notified about a network issue while billing"
        );
        Ok(())
    }
}
