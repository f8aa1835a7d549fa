use crate::domain::customer::Customer;
use crate::error::{BillingError, Result};
use std::io::Read;

/// Reads `id,currency` customer rows from a CSV source.
pub struct CustomerReader<R: Read> {
    reader: ::csv::Reader<R>,
}

impl<R: Read> CustomerReader<R> {
    pub fn new(source: R) -> Self {
        let reader = ::csv::ReaderBuilder::new()
            .trim(::csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    pub fn customers(self) -> impl Iterator<Item = Result<Customer>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BillingError::from))
    }
}
