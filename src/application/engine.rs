use super::rate_limiter::{RateLimitError, RateLimiter};
use super::retry::{RetryError, RetryPolicy};
use crate::config::BillingConfig;
use crate::domain::billing_case::{BillingCaseCategory, BillingCaseEvent};
use crate::domain::customer::CustomerId;
use crate::domain::failure::{ChargeError, FailureKind};
use crate::domain::invoice::{Invoice, InvoiceStatus};
use crate::domain::ports::{
    BillingCaseHandlerRef, CustomerNotifierRef, InvoiceSourceRef, OpsAlert, OpsAlerterRef,
    PaymentGatewayRef,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const RENEWED_MESSAGE: &str = "Your subscription has been renewed.";
pub const DECLINED_MESSAGE: &str =
    "Your subscription could not be renewed since payment was unsuccessful.";

/// A single failed charge attempt, gateway or limiter side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error(transparent)]
    Charge(#[from] ChargeError),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

impl AttemptError {
    /// Limiter rejections are never transient: they classify as `Unknown`.
    pub fn kind(&self) -> FailureKind {
        match self {
            AttemptError::Charge(err) => err.kind(),
            AttemptError::RateLimit(_) => FailureKind::Unknown,
        }
    }

    fn is_cancelled(&self) -> bool {
        matches!(self, AttemptError::RateLimit(RateLimitError::Cancelled))
    }
}

/// What one billing cycle did with one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoiceOutcome {
    Paid,
    Unpaid,
    Failed(BillingCaseCategory),
    /// Network failures outlasted the retries; still pending for next cycle.
    Deferred,
    /// Not pending when it reached the engine; never charged.
    Skipped,
    Cancelled,
    /// The charge settled but the status write failed.
    NotRecorded,
    /// The processing task was torn down by the runtime before finishing.
    Aborted,
}

impl fmt::Display for InvoiceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceOutcome::Paid => f.write_str("paid"),
            InvoiceOutcome::Unpaid => f.write_str("unpaid"),
            InvoiceOutcome::Failed(category) => write!(f, "failed({category})"),
            InvoiceOutcome::Deferred => f.write_str("deferred"),
            InvoiceOutcome::Skipped => f.write_str("skipped"),
            InvoiceOutcome::Cancelled => f.write_str("cancelled"),
            InvoiceOutcome::NotRecorded => f.write_str("not_recorded"),
            InvoiceOutcome::Aborted => f.write_str("aborted"),
        }
    }
}

/// The external systems a billing engine works against.
#[derive(Clone)]
pub struct Collaborators {
    pub invoices: InvoiceSourceRef,
    pub gateway: PaymentGatewayRef,
    pub notifier: CustomerNotifierRef,
    pub case_handler: BillingCaseHandlerRef,
    pub alerter: OpsAlerterRef,
}

/// Runs the charge pipeline for one invoice at a time.
///
/// Each call is self-contained: the only state shared between concurrent
/// calls is the rate limiter. Failures never escape `process_invoice`; they
/// end up as an [`InvoiceOutcome`].
pub struct BillingEngine {
    collaborators: Collaborators,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl BillingEngine {
    /// Creates a new `BillingEngine`.
    ///
    /// # Arguments
    ///
    /// * `collaborators` - The invoice source, gateway and side-effect ports.
    /// * `rate_limiter` - Limiter shared by every worker of this engine.
    /// * `retry` - Policy applied to transient charge failures.
    pub fn new(
        collaborators: Collaborators,
        rate_limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            collaborators,
            rate_limiter,
            retry,
        }
    }

    pub fn from_config(config: &BillingConfig, collaborators: Collaborators) -> Self {
        Self::new(
            collaborators,
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
            RetryPolicy::from_config(&config.retry),
        )
    }

    pub fn invoices(&self) -> &InvoiceSourceRef {
        &self.collaborators.invoices
    }

    #[tracing::instrument(
        name = "process_invoice",
        skip_all,
        fields(invoice_id = invoice.id, customer_id = invoice.customer_id)
    )]
    pub async fn process_invoice(
        &self,
        invoice: &Invoice,
        cancel: &CancellationToken,
    ) -> InvoiceOutcome {
        if !invoice.is_pending() {
            debug!(status = %invoice.status, "Invoice is not pending, skipping");
            return InvoiceOutcome::Skipped;
        }

        let result = self
            .retry
            .execute(
                cancel,
                |err: &AttemptError| err.kind().is_transient(),
                move |attempt| self.attempt_charge(invoice, attempt, cancel),
            )
            .await;

        match result {
            Ok(true) => self.settle(invoice, InvoiceStatus::Paid).await,
            Ok(false) => self.settle(invoice, InvoiceStatus::Unpaid).await,
            Err(RetryError::Exhausted { attempts, last }) => {
                self.defer(invoice, attempts, &last).await
            }
            Err(RetryError::Cancelled { .. }) => InvoiceOutcome::Cancelled,
            Err(RetryError::Permanent(err)) if err.is_cancelled() => InvoiceOutcome::Cancelled,
            Err(RetryError::Permanent(err)) => self.fail(invoice, &err).await,
        }
    }

    /// Records an invoice whose pipeline panicked as FAILED with an
    /// `Unknown` billing case, like any other unclassified failure.
    ///
    /// # Arguments
    ///
    /// * `invoice` - The invoice the panicking task was processing.
    /// * `reason` - The panic message, kept for the log.
    pub async fn fail_unexpectedly(&self, invoice: &Invoice, reason: &str) -> InvoiceOutcome {
        let err = AttemptError::Charge(ChargeError::Other(format!("panicked: {reason}")));
        self.fail(invoice, &err).await
    }

    async fn attempt_charge(
        &self,
        invoice: &Invoice,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<bool, AttemptError> {
        self.rate_limiter.acquire(cancel).await?;
        info!(attempt, amount = %invoice.amount, "Initiating payment");
        Ok(self.collaborators.gateway.charge(invoice).await?)
    }

    async fn settle(&self, invoice: &Invoice, status: InvoiceStatus) -> InvoiceOutcome {
        if let Err(err) = self
            .collaborators
            .invoices
            .update_status(invoice.id, status)
            .await
        {
            error!(error = %err, %status, "Could not record invoice status");
            return InvoiceOutcome::NotRecorded;
        }

        let (message, outcome) = if status == InvoiceStatus::Paid {
            info!("Payment was successful");
            (RENEWED_MESSAGE, InvoiceOutcome::Paid)
        } else {
            info!("Payment was declined, invoice set to UNPAID");
            (DECLINED_MESSAGE, InvoiceOutcome::Unpaid)
        };
        self.notify_customer(invoice.customer_id, message).await;
        outcome
    }

    async fn fail(&self, invoice: &Invoice, err: &AttemptError) -> InvoiceOutcome {
        let category = BillingCaseCategory::from(err.kind());
        error!(error = %err, %category, "Payment failed");

        if let Err(store_err) = self
            .collaborators
            .invoices
            .update_status(invoice.id, InvoiceStatus::Failed)
            .await
        {
            error!(error = %store_err, "Could not record invoice status");
            return InvoiceOutcome::NotRecorded;
        }

        let event = BillingCaseEvent::new(invoice.id, category);
        if let Err(handler_err) = self.collaborators.case_handler.handle(event).await {
            warn!(error = %handler_err, %category, "Billing case could not be created");
        }
        InvoiceOutcome::Failed(category)
    }

    async fn defer(&self, invoice: &Invoice, attempts: u32, last: &AttemptError) -> InvoiceOutcome {
        error!(
            attempts,
            error = %last,
            "Network failure persisted, leaving invoice pending for the next cycle"
        );
        let alert = OpsAlert {
            invoice_id: invoice.id,
            attempts,
            reason: last.to_string(),
        };
        if let Err(err) = self.collaborators.alerter.alert(alert).await {
            warn!(error = %err, "Operations alert could not be raised");
        }
        InvoiceOutcome::Deferred
    }

    async fn notify_customer(&self, customer_id: CustomerId, message: &str) {
        if let Err(err) = self.collaborators.notifier.notify(customer_id, message).await {
            warn!(error = %err, "Customer notification failed");
        }
    }
}
