use crate::domain::invoice::{Invoice, InvoiceId, InvoiceStatus};
use crate::domain::ports::InvoiceSource;
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory invoice store.
///
/// Uses `Arc<RwLock<BTreeMap<InvoiceId, Invoice>>>` so clones share state and
/// listings come back ordered by id. Status writes are checked against the
/// invoice state machine.
#[derive(Default, Clone)]
pub struct InMemoryInvoiceStore {
    invoices: Arc<RwLock<BTreeMap<InvoiceId, Invoice>>>,
}

impl InMemoryInvoiceStore {
    /// Creates a new, empty in-memory invoice store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with `invoices`. Later duplicates of an id
    /// replace earlier ones.
    pub fn with_invoices(invoices: impl IntoIterator<Item = Invoice>) -> Self {
        let map = invoices
            .into_iter()
            .map(|invoice| (invoice.id, invoice))
            .collect();
        Self {
            invoices: Arc::new(RwLock::new(map)),
        }
    }

    /// Inserts or replaces an invoice.
    pub async fn insert(&self, invoice: Invoice) {
        let mut invoices = self.invoices.write().await;
        invoices.insert(invoice.id, invoice);
    }

    pub async fn get(&self, invoice_id: InvoiceId) -> Option<Invoice> {
        let invoices = self.invoices.read().await;
        invoices.get(&invoice_id).cloned()
    }

    pub async fn all(&self) -> Vec<Invoice> {
        let invoices = self.invoices.read().await;
        invoices.values().cloned().collect()
    }
}

#[async_trait]
impl InvoiceSource for InMemoryInvoiceStore {
    async fn fetch_pending(&self) -> Result<Vec<Invoice>> {
        let invoices = self.invoices.read().await;
        Ok(invoices
            .values()
            .filter(|invoice| invoice.is_pending())
            .cloned()
            .collect())
    }

    async fn update_status(&self, invoice_id: InvoiceId, status: InvoiceStatus) -> Result<()> {
        let mut invoices = self.invoices.write().await;
        let invoice = invoices
            .get_mut(&invoice_id)
            .ok_or(BillingError::InvoiceNotFound(invoice_id))?;

        if !invoice.status.can_transition_to(status) {
            return Err(BillingError::InvalidTransition {
                id: invoice_id,
                from: invoice.status,
                to: status,
            });
        }
        invoice.status = status;
        Ok(())
    }
}
