//! CSV adapters: loading invoices and customers for a run, and writing the
//! settled invoices back out.

pub mod customer_reader;
pub mod invoice_reader;
pub mod invoice_writer;

use crate::domain::customer::CustomerId;
use crate::domain::invoice::{Invoice, InvoiceId, InvoiceStatus};
use crate::domain::money::{Currency, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Flat CSV row for an invoice: `id,customer,amount,currency,status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: InvoiceId,
    pub customer: CustomerId,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub status: InvoiceStatus,
}

impl From<InvoiceRecord> for Invoice {
    fn from(record: InvoiceRecord) -> Self {
        Invoice::new(
            record.id,
            record.customer,
            Money::new(record.amount, record.currency),
        )
        .with_status(record.status)
    }
}

impl From<&Invoice> for InvoiceRecord {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id,
            customer: invoice.customer_id,
            amount: invoice.amount.value(),
            currency: invoice.amount.currency(),
            status: invoice.status,
        }
    }
}
