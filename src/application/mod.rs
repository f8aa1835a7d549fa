//! Application layer: the billing pipeline and the policies it composes.
//!
//! `InvoiceDispatcher` is the entry point for one billing cycle. It queues the
//! pending batch for a fixed pool of tokio workers, each of which runs the
//! `BillingEngine` pipeline (rate limit, charge, retry, classify, record,
//! notify) for one invoice at a time.

pub mod dispatcher;
pub mod engine;
pub mod rate_limiter;
pub mod retry;
