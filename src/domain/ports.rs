use super::cart::CartLine;
use super::ids::{OrderId, ProductId, UserId, VendorId};
use super::money::Money;
use super::order::{Order, PaymentMethod};
use super::product::{Product, StockAdjustment};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Catalog reads plus the counter updates the stock ledger needs.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get(&self, product_id: &ProductId) -> Result<Option<Product>>;
    async fn all_products(&self) -> Result<Vec<Product>>;
    /// Applies every adjustment or none of them.
    ///
    /// Fails with `StockConflict` if a product's stock no longer matches
    /// `expected_stock`, and with `InsufficientStock` if a counter would go
    /// negative.
    async fn adjust(&self, adjustments: &[StockAdjustment]) -> Result<()>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn lines(&self, user_id: &UserId) -> Result<Vec<CartLine>>;
    /// Inserts or replaces the line for the same product.
    async fn put_line(&self, user_id: &UserId, line: CartLine) -> Result<()>;
    /// Drops the lines for exactly these products; other lines stay.
    async fn remove_lines(&self, user_id: &UserId, product_ids: &[ProductId]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub reference: String,
    pub user_id: UserId,
    pub vendor_id: VendorId,
    pub amount: Money,
    pub method: PaymentMethod,
    /// Stable across client retries of the same purchase intent.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// `settled` is false for deferred methods that only register the intent.
    Approved {
        transaction_id: Option<String>,
        settled: bool,
    },
    Declined {
        reason: String,
    },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save(&self, order: Order) -> Result<()>;
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>>;
    /// Newest first.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Order>>;
    /// Newest first. `page` is 1-based.
    async fn find_by_vendor(&self, vendor_id: &VendorId, page: u32, limit: u32)
    -> Result<Page<Order>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type ProductStoreHandle = Arc<dyn ProductStore>;
pub type CartStoreHandle = Arc<dyn CartStore>;
pub type PaymentGatewayHandle = Arc<dyn PaymentGateway>;
pub type OrderRepositoryHandle = Arc<dyn OrderRepository>;
pub type ClockHandle = Arc<dyn Clock>;

/// One page of a newest-first listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub next: Option<u32>,
    pub prev: Option<u32>,
}

impl<T> Page<T> {
    /// Cuts page `page` (1-based, 0 treated as 1) out of an already ordered list.
    pub fn from_sorted(all: Vec<T>, page: u32, limit: u32) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let total = all.len();
        let start = (page as usize - 1).saturating_mul(limit as usize);
        let end = start.saturating_add(limit as usize);
        let items = all.into_iter().skip(start).take(limit as usize).collect();

        Self {
            items,
            total,
            page,
            limit,
            next: page.checked_add(1).filter(|_| end < total),
            prev: (start > 0).then(|| page - 1),
        }
    }
}
