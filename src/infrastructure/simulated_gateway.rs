use crate::domain::customer::{Customer, CustomerId};
use crate::domain::failure::ChargeError;
use crate::domain::invoice::Invoice;
use crate::domain::ports::PaymentGateway;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;

/// A stand-in payment provider for local runs.
///
/// Validates the customer and currency like a real provider would, then
/// declines or drops the connection at the configured rates. Seeding the
/// generator makes a run reproducible.
pub struct SimulatedPaymentGateway {
    customers: HashMap<CustomerId, Customer>,
    decline_rate: f64,
    network_failure_rate: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedPaymentGateway {
    pub fn new(customers: impl IntoIterator<Item = Customer>) -> Self {
        Self {
            customers: customers.into_iter().map(|c| (c.id, c)).collect(),
            decline_rate: 0.0,
            network_failure_rate: 0.0,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_decline_rate(mut self, rate: f64) -> Self {
        self.decline_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_network_failure_rate(mut self, rate: f64) -> Self {
        self.network_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn roll(&self, probability: f64) -> Result<bool, ChargeError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ChargeError::Other("random source poisoned".to_string()))?;
        Ok(rng.gen_bool(probability))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn charge(&self, invoice: &Invoice) -> Result<bool, ChargeError> {
        if self.roll(self.network_failure_rate)? {
            return Err(ChargeError::Network(
                "connection reset by payment provider".to_string(),
            ));
        }

        let customer = self
            .customers
            .get(&invoice.customer_id)
            .ok_or(ChargeError::CustomerNotFound(invoice.customer_id))?;

        if customer.currency != invoice.amount.currency() {
            return Err(ChargeError::CurrencyMismatch {
                invoice_id: invoice.id,
                customer_id: customer.id,
            });
        }

        Ok(!self.roll(self.decline_rate)?)
    }
}
