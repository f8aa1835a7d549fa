use billrun::application::dispatcher::InvoiceDispatcher;
use billrun::application::engine::{BillingEngine, Collaborators};
use billrun::config::BillingConfig;
use billrun::domain::customer::{Customer, CustomerId};
use billrun::domain::invoice::Invoice;
use billrun::infrastructure::in_memory::InMemoryInvoiceStore;
use billrun::infrastructure::logging::{LoggingCaseHandler, LoggingNotifier, LoggingOpsAlerter};
use billrun::infrastructure::simulated_gateway::SimulatedPaymentGateway;
use billrun::interfaces::csv::customer_reader::CustomerReader;
use billrun::interfaces::csv::invoice_reader::InvoiceReader;
use billrun::interfaces::csv::invoice_writer::InvoiceWriter;
use billrun::telemetry;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(author, version, about = "Runs one billing cycle over pending invoices", long_about = None)]
struct Cli {
    /// Input invoices CSV file (id,customer,amount,currency,status)
    input: PathBuf,

    /// Customers CSV file (id,currency). Defaults to one customer per invoice in the invoice's currency.
    #[arg(long)]
    customers: Option<PathBuf>,

    /// JSON billing configuration file. BILLRUN_* environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of concurrent billing workers (overrides file and environment)
    #[arg(long)]
    pool_size: Option<usize>,

    /// Probability that the simulated gateway declines a charge
    #[arg(long, default_value_t = 0.5, value_parser = parse_probability)]
    decline_rate: f64,

    /// Probability that the simulated gateway fails with a network error
    #[arg(long, default_value_t = 0.0, value_parser = parse_probability)]
    network_failure_rate: f64,

    /// Seed for the simulated gateway, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn parse_probability(raw: &str) -> std::result::Result<f64, String> {
    let value: f64 = raw.parse().map_err(|_| format!("'{raw}' is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("'{raw}' is not between 0 and 1"))
    }
}

/// One customer per id, in the currency of their first invoice. Invoices in
/// any other currency will then fail with a currency mismatch.
fn customers_from_invoices(invoices: &[Invoice]) -> Vec<Customer> {
    let mut customers: BTreeMap<CustomerId, Customer> = BTreeMap::new();
    for invoice in invoices {
        let currency = invoice.amount.currency();
        match customers.get(&invoice.customer_id) {
            Some(known) if known.currency != currency => tracing::warn!(
                customer_id = invoice.customer_id,
                invoice_id = invoice.id,
                kept = %known.currency,
                ignored = %currency,
                "Customer has invoices in more than one currency"
            ),
            Some(_) => {}
            None => {
                customers.insert(
                    invoice.customer_id,
                    Customer::new(invoice.customer_id, currency),
                );
            }
        }
    }
    customers.into_values().collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level, cli.log_json);

    let mut config = BillingConfig::load(cli.config.as_deref()).into_diagnostic()?;
    if let Some(pool_size) = cli.pool_size {
        config.pool_size = pool_size;
    }
    config.validate().into_diagnostic()?;

    // Load invoices, skipping unreadable rows
    let store = InMemoryInvoiceStore::new();
    let file = File::open(&cli.input).into_diagnostic()?;
    for invoice_result in InvoiceReader::new(file).invoices() {
        match invoice_result {
            Ok(invoice) => store.insert(invoice).await,
            Err(e) => tracing::warn!(error = %e, "Error reading invoice"),
        }
    }

    let customers: Vec<Customer> = match &cli.customers {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            CustomerReader::new(file)
                .customers()
                .collect::<billrun::error::Result<_>>()
                .into_diagnostic()?
        }
        None => customers_from_invoices(&store.all().await),
    };

    let mut gateway = SimulatedPaymentGateway::new(customers)
        .with_decline_rate(cli.decline_rate)
        .with_network_failure_rate(cli.network_failure_rate);
    if let Some(seed) = cli.seed {
        gateway = gateway.with_seed(seed);
    }

    let collaborators = Collaborators {
        invoices: Arc::new(store.clone()),
        gateway: Arc::new(gateway),
        notifier: Arc::new(LoggingNotifier),
        case_handler: Arc::new(LoggingCaseHandler),
        alerter: Arc::new(LoggingOpsAlerter),
    };
    let engine = Arc::new(BillingEngine::from_config(&config, collaborators));
    let dispatcher = InvoiceDispatcher::new(engine, config.pool_size);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal, cancelling billing cycle");
            signal_token.cancel();
        }
    });

    let cycle = dispatcher.run_billing_cycle(cancel).await.into_diagnostic()?;
    let report = cycle.wait().await.into_diagnostic()?;
    eprintln!("Billing cycle complete: {report}");

    // Output final invoice state
    let invoices = store.all().await;
    let stdout = io::stdout();
    let mut writer = InvoiceWriter::new(stdout.lock());
    writer.write_invoices(&invoices).into_diagnostic()?;

    Ok(())
}
