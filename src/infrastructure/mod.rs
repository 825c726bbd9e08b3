//! Adapters implementing the domain ports.
//!
//! In-memory stores, a simulated payment gateway and clocks are always
//! available. The RocksDB order repository requires the `storage-rocksdb`
//! feature.

pub mod clock;
pub mod in_memory;
pub mod payment;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
