use super::engine::{BillingEngine, InvoiceOutcome};
use crate::domain::invoice::{Invoice, InvoiceId};
use crate::error::{BillingError, Result};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type InvoiceQueue = Arc<Mutex<mpsc::Receiver<Invoice>>>;

/// Per-invoice outcomes of one billing cycle, ordered by invoice id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub outcomes: Vec<(InvoiceId, InvoiceOutcome)>,
}

impl CycleReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcome_of(&self, invoice_id: InvoiceId) -> Option<InvoiceOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == invoice_id)
            .map(|(_, outcome)| *outcome)
    }

    pub fn count(&self, matches: impl Fn(&InvoiceOutcome) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches(outcome))
            .count()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} paid={} unpaid={} failed={} deferred={} skipped={} cancelled={} not_recorded={} aborted={}",
            self.len(),
            self.count(|o| *o == InvoiceOutcome::Paid),
            self.count(|o| *o == InvoiceOutcome::Unpaid),
            self.count(|o| matches!(o, InvoiceOutcome::Failed(_))),
            self.count(|o| *o == InvoiceOutcome::Deferred),
            self.count(|o| *o == InvoiceOutcome::Skipped),
            self.count(|o| *o == InvoiceOutcome::Cancelled),
            self.count(|o| *o == InvoiceOutcome::NotRecorded),
            self.count(|o| *o == InvoiceOutcome::Aborted),
        )
    }
}

/// A running billing cycle.
///
/// Dropping it leaves the cycle running in the background; `wait` blocks
/// until every dispatched invoice has an outcome.
pub struct BillingCycle {
    dispatched: usize,
    handle: JoinHandle<CycleReport>,
}

impl BillingCycle {
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub async fn wait(self) -> Result<CycleReport> {
        self.handle
            .await
            .map_err(|err| BillingError::WorkerError(err.to_string()))
    }
}

/// Fans the pending batch out over a fixed pool of workers.
pub struct InvoiceDispatcher {
    engine: Arc<BillingEngine>,
    pool_size: usize,
}

impl InvoiceDispatcher {
    /// Creates a dispatcher over `engine`.
    ///
    /// # Arguments
    ///
    /// * `engine` - The engine every worker runs invoices through.
    /// * `pool_size` - Number of workers; values below 1 are raised to 1.
    pub fn new(engine: Arc<BillingEngine>, pool_size: usize) -> Self {
        Self {
            engine,
            pool_size: pool_size.max(1),
        }
    }

    /// Fetches every pending invoice once and hands it to the worker pool.
    ///
    /// Returns as soon as the batch is queued. Invoices still queued when
    /// `cancel` fires are reported as cancelled and left untouched.
    pub async fn run_billing_cycle(&self, cancel: CancellationToken) -> Result<BillingCycle> {
        let fetched = self.engine.invoices().fetch_pending().await?;

        let mut seen = HashSet::new();
        let batch: Vec<Invoice> = fetched
            .into_iter()
            .filter(|invoice| {
                if !invoice.is_pending() {
                    warn!(invoice_id = invoice.id, status = %invoice.status, "Ignoring non-pending invoice");
                    return false;
                }
                if !seen.insert(invoice.id) {
                    warn!(invoice_id = invoice.id, "Ignoring duplicate invoice in batch");
                    return false;
                }
                true
            })
            .collect();

        let dispatched = batch.len();
        let (tx, rx) = mpsc::channel(dispatched.max(1));
        for invoice in batch {
            tx.try_send(invoice)
                .map_err(|err| BillingError::WorkerError(err.to_string()))?;
        }
        drop(tx);

        let workers = self.pool_size.min(dispatched);
        info!(dispatched, workers, "Starting billing cycle");

        let queue: InvoiceQueue = Arc::new(Mutex::new(rx));
        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            pool.spawn(run_worker(
                worker_id,
                self.engine.clone(),
                queue.clone(),
                cancel.clone(),
            ));
        }

        let handle = tokio::spawn(async move {
            let mut outcomes = Vec::with_capacity(dispatched);
            while let Some(joined) = pool.join_next().await {
                match joined {
                    Ok(mut done) => outcomes.append(&mut done),
                    Err(err) => error!(error = %err, "Billing worker stopped unexpectedly"),
                }
            }

            let mut rest = queue.lock().await;
            while let Ok(invoice) = rest.try_recv() {
                outcomes.push((invoice.id, InvoiceOutcome::Cancelled));
            }

            outcomes.sort_by_key(|(id, _)| *id);
            let report = CycleReport { outcomes };
            info!(%report, "Billing cycle finished");
            report
        });

        Ok(BillingCycle { dispatched, handle })
    }
}

async fn run_worker(
    worker_id: usize,
    engine: Arc<BillingEngine>,
    queue: InvoiceQueue,
    cancel: CancellationToken,
) -> Vec<(InvoiceId, InvoiceOutcome)> {
    debug!(worker_id, "Billing worker started");
    let mut done = Vec::new();

    loop {
        if cancel.is_cancelled() {
            info!(worker_id, "Cancellation requested, worker stopping");
            break;
        }
        let next = queue.lock().await.recv().await;
        let Some(invoice) = next else { break };

        let invoice_id = invoice.id;
        let task_invoice = invoice.clone();
        let task_engine = engine.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            task_engine
                .process_invoice(&task_invoice, &task_cancel)
                .await
        });

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => {
                let reason = panic_reason(err.into_panic());
                error!(worker_id, invoice_id, %reason, "Invoice processing panicked");
                engine.fail_unexpectedly(&invoice, &reason).await
            }
            Err(err) => {
                error!(worker_id, invoice_id, error = %err, "Invoice processing aborted");
                InvoiceOutcome::Aborted
            }
        };
        done.push((invoice_id, outcome));
    }

    debug!(worker_id, processed = done.len(), "Billing worker stopped");
    done
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
