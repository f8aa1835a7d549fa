#![allow(dead_code)]

use async_trait::async_trait;
use billrun::application::dispatcher::{CycleReport, InvoiceDispatcher};
use billrun::application::engine::{BillingEngine, Collaborators};
use billrun::config::BillingConfig;
use billrun::domain::billing_case::BillingCaseEvent;
use billrun::domain::customer::CustomerId;
use billrun::domain::failure::ChargeError;
use billrun::domain::invoice::{Invoice, InvoiceId, InvoiceStatus};
use billrun::domain::money::{Currency, Money};
use billrun::domain::ports::{
    BillingCaseHandler, CustomerNotifier, InvoiceSource, OpsAlert, OpsAlerter, PaymentGateway,
};
use billrun::error::{BillingError, Result};
use billrun::infrastructure::in_memory::InMemoryInvoiceStore;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub fn pending_invoice(id: InvoiceId, customer_id: CustomerId) -> Invoice {
    Invoice::new(id, customer_id, Money::new(dec!(100.0), Currency::Eur))
}

/// Gateway whose answers are scripted per invoice.
///
/// The last scripted answer repeats; unscripted invoices are charged.
#[derive(Default)]
pub struct ScriptedGateway {
    scripts: Mutex<HashMap<InvoiceId, VecDeque<std::result::Result<bool, ChargeError>>>>,
    calls: Mutex<HashMap<InvoiceId, u32>>,
    charged_at: Mutex<Vec<Instant>>,
    delay: Option<Duration>,
    panic_on: Option<InvoiceId>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn panicking_on(mut self, invoice_id: InvoiceId) -> Self {
        self.panic_on = Some(invoice_id);
        self
    }

    pub fn script(
        &self,
        invoice_id: InvoiceId,
        answers: Vec<std::result::Result<bool, ChargeError>>,
    ) {
        self.scripts
            .lock()
            .unwrap()
            .insert(invoice_id, answers.into());
    }

    pub fn calls(&self, invoice_id: InvoiceId) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&invoice_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn call_counts(&self) -> HashMap<InvoiceId, u32> {
        self.calls.lock().unwrap().clone()
    }

    pub fn charged_at(&self) -> Vec<Instant> {
        self.charged_at.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_answer(&self, invoice_id: InvoiceId) -> std::result::Result<bool, ChargeError> {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&invoice_id) {
            Some(answers) if answers.len() > 1 => answers.pop_front().unwrap(),
            Some(answers) => answers.front().cloned().unwrap_or(Ok(true)),
            None => Ok(true),
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn charge(&self, invoice: &Invoice) -> std::result::Result<bool, ChargeError> {
        *self.calls.lock().unwrap().entry(invoice.id).or_insert(0) += 1;
        self.charged_at.lock().unwrap().push(Instant::now());

        if self.panic_on == Some(invoice.id) {
            panic!("gateway blew up on invoice {}", invoice.id);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.next_answer(invoice.id)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(CustomerId, String)>>,
    pub failing: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(CustomerId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CustomerNotifier for RecordingNotifier {
    async fn notify(&self, customer_id: CustomerId, message: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((customer_id, message.to_string()));
        if self.failing {
            return Err(BillingError::WorkerError("mail server down".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingCaseHandler {
    pub events: Mutex<Vec<BillingCaseEvent>>,
}

impl RecordingCaseHandler {
    pub fn events(&self) -> Vec<BillingCaseEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl BillingCaseHandler for RecordingCaseHandler {
    async fn handle(&self, event: BillingCaseEvent) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAlerter {
    pub alerts: Mutex<Vec<OpsAlert>>,
}

impl RecordingAlerter {
    pub fn alerts(&self) -> Vec<OpsAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl OpsAlerter for RecordingAlerter {
    async fn alert(&self, alert: OpsAlert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert);
        Ok(())
    }
}

/// Invoice source serving a fixed batch as-is and recording status writes.
#[derive(Default)]
pub struct FixedInvoiceSource {
    pub batch: Vec<Invoice>,
    pub updates: Mutex<Vec<(InvoiceId, InvoiceStatus)>>,
    pub reject_updates: bool,
}

impl FixedInvoiceSource {
    pub fn updates(&self) -> Vec<(InvoiceId, InvoiceStatus)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl InvoiceSource for FixedInvoiceSource {
    async fn fetch_pending(&self) -> Result<Vec<Invoice>> {
        Ok(self.batch.clone())
    }

    async fn update_status(&self, invoice_id: InvoiceId, status: InvoiceStatus) -> Result<()> {
        if self.reject_updates {
            return Err(BillingError::InvoiceNotFound(invoice_id));
        }
        self.updates.lock().unwrap().push((invoice_id, status));
        Ok(())
    }
}

/// Reference configuration with the retry backoff and limiter untouched.
pub fn reference_config() -> BillingConfig {
    BillingConfig::default()
}

pub struct Harness {
    pub store: InMemoryInvoiceStore,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub cases: Arc<RecordingCaseHandler>,
    pub alerts: Arc<RecordingAlerter>,
}

impl Harness {
    pub fn new(invoices: Vec<Invoice>) -> Self {
        Self::with_gateway(invoices, ScriptedGateway::new())
    }

    pub fn with_gateway(invoices: Vec<Invoice>, gateway: ScriptedGateway) -> Self {
        Self {
            store: InMemoryInvoiceStore::with_invoices(invoices),
            gateway: Arc::new(gateway),
            notifier: Arc::new(RecordingNotifier::default()),
            cases: Arc::new(RecordingCaseHandler::default()),
            alerts: Arc::new(RecordingAlerter::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            invoices: Arc::new(self.store.clone()),
            gateway: self.gateway.clone(),
            notifier: self.notifier.clone(),
            case_handler: self.cases.clone(),
            alerter: self.alerts.clone(),
        }
    }

    pub fn dispatcher(&self, config: &BillingConfig) -> InvoiceDispatcher {
        let engine = Arc::new(BillingEngine::from_config(config, self.collaborators()));
        InvoiceDispatcher::new(engine, config.pool_size)
    }

    pub async fn run_cycle(&self, config: &BillingConfig) -> CycleReport {
        self.dispatcher(config)
            .run_billing_cycle(CancellationToken::new())
            .await
            .unwrap()
            .wait()
            .await
            .unwrap()
    }

    pub async fn status_of(&self, invoice_id: InvoiceId) -> InvoiceStatus {
        self.store.get(invoice_id).await.unwrap().status
    }
}
