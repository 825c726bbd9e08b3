//! Application layer orchestrating the fulfillment rules.
//!
//! [`engine::FulfillmentEngine`] is the entry point. It wires the vendor
//! splitter, stock ledger, order factory and checkout orchestrator to the
//! ports, and serializes lifecycle transitions per order.

pub mod access;
pub mod checkout;
pub mod engine;
pub mod factory;
pub mod idempotency;
pub mod ledger;
pub mod orders;
pub mod splitter;
