use super::InvoiceRecord;
use crate::domain::invoice::Invoice;
use crate::error::{BillingError, Result};
use std::io::Read;

/// Reads invoices from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming. A missing `status` column
/// means every row is pending.
pub struct InvoiceReader<R: Read> {
    reader: ::csv::Reader<R>,
}

impl<R: Read> InvoiceReader<R> {
    pub fn new(source: R) -> Self {
        let reader = ::csv::ReaderBuilder::new()
            .trim(::csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one invoice per row.
    pub fn invoices(self) -> impl Iterator<Item = Result<Invoice>> {
        self.reader
            .into_deserialize::<InvoiceRecord>()
            .map(|result| result.map(Invoice::from).map_err(BillingError::from))
    }
}
