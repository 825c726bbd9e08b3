use crate::domain::money::{Money, TaxRate};
use crate::error::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Per-deployment pricing and timing policy.
///
/// Loaded from a JSON file; every field is optional and falls back to the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Applied to every order subtotal. Zero unless the deployment charges VAT.
    pub tax_rate: TaxRate,
    /// Flat fee for home delivery. Pickup is always free.
    pub shipping_fee: Money,
    pub payment_timeout_ms: u64,
    /// Width of the time bucket that makes checkout retries idempotent.
    pub idempotency_window_secs: u64,
    pub default_page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tax_rate: TaxRate::NONE,
            shipping_fee: Money::ZERO,
            payment_timeout_ms: 5_000,
            idempotency_window_secs: 600,
            default_page_size: 10,
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }

    pub fn idempotency_window(&self) -> Duration {
        Duration::from_secs(self.idempotency_window_secs.max(1))
    }
}
