use super::factory::OrderIdentity;
use crate::domain::cart::CartLine;
use crate::domain::ids::{OrderId, UserId, VendorId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

/// Identifies one purchase intent: the same shopper buying the same lines
/// from the same vendor within one time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntentKey(String);

impl IntentKey {
    pub fn derive(
        user_id: &UserId,
        vendor_id: &VendorId,
        lines: &[CartLine],
        now: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        let mut items: Vec<String> = lines
            .iter()
            .map(|line| format!("{}x{}", line.product_id(), line.quantity()))
            .collect();
        items.sort();

        let window_secs = i64::try_from(window.as_secs().max(1)).unwrap_or(i64::MAX);
        let bucket = now.timestamp().div_euclid(window_secs);

        Self(format!("{user_id}|{vendor_id}|{}|{bucket}", items.join(",")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentState {
    /// The gateway did not answer in time. A retry reuses this identity.
    AwaitingPayment(OrderIdentity),
    Completed(OrderId),
}

#[derive(Debug, Clone)]
struct IntentEntry {
    state: IntentState,
    recorded_at: DateTime<Utc>,
}

/// Remembers recent checkout intents so a client retry never produces a
/// second order for the same purchase.
#[derive(Debug, Default)]
pub struct IntentCache {
    entries: DashMap<IntentKey, IntentEntry>,
}

impl IntentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &IntentKey) -> Option<IntentState> {
        self.entries.get(key).map(|entry| entry.state.clone())
    }

    pub fn record(&self, key: IntentKey, state: IntentState, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            IntentEntry {
                state,
                recorded_at: now,
            },
        );
    }

    pub fn forget(&self, key: &IntentKey) {
        self.entries.remove(key);
    }

    /// Drops entries older than `ttl`. Their keys belong to past time buckets
    /// and can no longer match.
    pub fn cleanup(&self, now: DateTime<Utc>, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        self.entries.retain(|_, entry| now - entry.recorded_at < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
