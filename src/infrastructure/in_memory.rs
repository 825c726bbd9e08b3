use crate::domain::cart::CartLine;
use crate::domain::ids::{OrderId, ProductId, UserId, VendorId};
use crate::domain::order::Order;
use crate::domain::ports::{CartStore, OrderRepository, Page, ProductStore};
use crate::domain::product::{Product, StockAdjustment};
use crate::error::{FulfillmentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory catalog.
///
/// Uses `Arc<RwLock<HashMap<ProductId, Product>>>` so clones share the same
/// products. Stock adjustments are validated and applied under one write lock.
#[derive(Default, Clone)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products
            .into_iter()
            .map(|product| (product.id.clone(), product))
            .collect();
        Self {
            products: Arc::new(RwLock::new(products)),
        }
    }

    /// Inserts or replaces a product. Stands in for catalog edits.
    pub async fn upsert(&self, product: Product) {
        let mut products = self.products.write().await;
        products.insert(product.id.clone(), product);
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn get(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.get(product_id).cloned())
    }

    async fn all_products(&self) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(products.values().cloned().collect())
    }

    async fn adjust(&self, adjustments: &[StockAdjustment]) -> Result<()> {
        let mut products = self.products.write().await;

        let mut updated = Vec::with_capacity(adjustments.len());
        for adjustment in adjustments {
            let product = products.get(&adjustment.product_id).ok_or_else(|| {
                FulfillmentError::NotFound {
                    entity: "product",
                    id: adjustment.product_id.to_string(),
                }
            })?;
            if product.stock != adjustment.expected_stock {
                return Err(FulfillmentError::StockConflict {
                    product_id: adjustment.product_id.clone(),
                });
            }
            let (stock, sold) = adjustment
                .apply_to(product.stock, product.sold)
                .ok_or_else(|| FulfillmentError::InsufficientStock {
                    product_id: adjustment.product_id.clone(),
                    available: product.stock,
                    requested: u32::try_from(adjustment.stock_delta.unsigned_abs())
                        .unwrap_or(u32::MAX),
                })?;
            updated.push((adjustment.product_id.clone(), stock, sold));
        }

        for (product_id, stock, sold) in updated {
            if let Some(product) = products.get_mut(&product_id) {
                product.stock = stock;
                product.sold = sold;
            }
        }
        Ok(())
    }
}

/// A thread-safe in-memory cart store, one ordered line list per user.
#[derive(Default, Clone)]
pub struct InMemoryCartStore {
    carts: Arc<RwLock<HashMap<UserId, Vec<CartLine>>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn lines(&self, user_id: &UserId) -> Result<Vec<CartLine>> {
        let carts = self.carts.read().await;
        Ok(carts.get(user_id).cloned().unwrap_or_default())
    }

    async fn put_line(&self, user_id: &UserId, line: CartLine) -> Result<()> {
        let mut carts = self.carts.write().await;
        let lines = carts.entry(user_id.clone()).or_default();
        match lines
            .iter_mut()
            .find(|existing| existing.product_id() == line.product_id())
        {
            Some(existing) => *existing = line,
            None => lines.push(line),
        }
        Ok(())
    }

    async fn remove_lines(&self, user_id: &UserId, product_ids: &[ProductId]) -> Result<()> {
        let mut carts = self.carts.write().await;
        if let Some(lines) = carts.get_mut(user_id) {
            lines.retain(|line| !product_ids.contains(line.product_id()));
        }
        Ok(())
    }
}

/// A thread-safe in-memory order repository.
#[derive(Default, Clone)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn newest_first<F>(&self, keep: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders.values().filter(|o| keep(o)).cloned().collect();
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.reference().cmp(a.reference()))
        });
        matching
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id(), order);
        Ok(())
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&order_id).cloned())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        Ok(self.newest_first(|order| order.user_id() == user_id).await)
    }

    async fn find_by_vendor(
        &self,
        vendor_id: &VendorId,
        page: u32,
        limit: u32,
    ) -> Result<Page<Order>> {
        let all = self.newest_first(|order| order.vendor_id() == vendor_id).await;
        Ok(Page::from_sorted(all, page, limit))
    }
}
