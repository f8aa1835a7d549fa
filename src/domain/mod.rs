//! Domain model: money, invoices and their status machine, failure
//! classification and the ports through which the billing core talks to the
//! outside world.

pub mod billing_case;
pub mod customer;
pub mod failure;
pub mod invoice;
pub mod money;
pub mod ports;
