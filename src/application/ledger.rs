use crate::domain::cart::CartLine;
use crate::domain::ids::ProductId;
use crate::domain::order::OrderLineSnapshot;
use crate::domain::ports::ProductStoreHandle;
use crate::domain::product::{Product, StockAdjustment};
use crate::error::{FulfillmentError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// A cart line checked against the catalog, with the product as it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedLine {
    pub product: Product,
    pub quantity: u32,
}

/// Authoritative owner of product stock and sold counters.
///
/// Every product has an async lock. A checkout holds the locks for all of its
/// products from verification until commit, so two checkouts touching the
/// same product cannot interleave. Locks are always taken in product-id order.
pub struct StockLedger {
    products: ProductStoreHandle,
    locks: DashMap<ProductId, Arc<Mutex<()>>>,
}

impl StockLedger {
    pub fn new(products: ProductStoreHandle) -> Self {
        Self {
            products,
            locks: DashMap::new(),
        }
    }

    /// Lock-free check that every line could be supplied right now.
    ///
    /// Used as an early, side-effect-free rejection. The answer can be stale
    /// by the time a reservation is taken; [`reserve`](Self::reserve)
    /// verifies again under the locks.
    pub async fn verify(&self, lines: &[CartLine]) -> Result<Vec<VerifiedLine>> {
        let mut verified = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self
                .products
                .get(line.product_id())
                .await?
                .filter(|product| product.active)
                .ok_or_else(|| FulfillmentError::ProductUnavailable {
                    product_id: line.product_id().clone(),
                })?;

            if !product.can_supply(line.quantity()) {
                return Err(FulfillmentError::InsufficientStock {
                    product_id: product.id.clone(),
                    available: product.available(),
                    requested: line.quantity(),
                });
            }

            verified.push(VerifiedLine {
                product,
                quantity: line.quantity(),
            });
        }
        Ok(verified)
    }

    /// Locks the products of `lines` and verifies them.
    ///
    /// On success the returned reservation keeps the locks until it is
    /// committed or dropped. On failure the locks are released and no counter
    /// has been touched.
    pub async fn reserve(&self, lines: &[CartLine]) -> Result<StockReservation<'_>> {
        self.lock(lines).await.verify().await
    }

    /// Takes the product locks for `lines` without checking stock yet.
    pub async fn lock(&self, lines: &[CartLine]) -> LockedLines<'_> {
        let guards = self.lock_all(lines.iter().map(CartLine::product_id)).await;
        LockedLines {
            ledger: self,
            lines: lines.to_vec(),
            guards,
        }
    }

    /// Returns the lines of a cancelled order to stock.
    pub async fn rollback(&self, lines: &[OrderLineSnapshot]) -> Result<()> {
        self.shift(lines, StockAdjustment::restock).await?;
        info!(lines = lines.len(), "stock released");
        Ok(())
    }

    /// Takes the lines of an order back out of stock after a release whose
    /// cancellation could not be recorded.
    pub async fn resell(&self, lines: &[OrderLineSnapshot]) -> Result<()> {
        self.shift(lines, StockAdjustment::sale).await?;
        info!(lines = lines.len(), "stock taken back");
        Ok(())
    }

    async fn shift<F>(&self, lines: &[OrderLineSnapshot], adjustment: F) -> Result<()>
    where
        F: Fn(ProductId, u32, u32) -> StockAdjustment,
    {
        let _guards = self
            .lock_all(lines.iter().map(OrderLineSnapshot::product_id))
            .await;

        let mut adjustments = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self.products.get(line.product_id()).await?.ok_or_else(|| {
                FulfillmentError::NotFound {
                    entity: "product",
                    id: line.product_id().to_string(),
                }
            })?;
            adjustments.push(adjustment(product.id, product.stock, line.quantity()));
        }

        self.products.adjust(&adjustments).await
    }

    async fn lock_all<'a, I>(&self, product_ids: I) -> Vec<OwnedMutexGuard<()>>
    where
        I: Iterator<Item = &'a ProductId>,
    {
        let mut ids: Vec<&ProductId> = product_ids.collect();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            let lock = self.locks.entry(id.clone()).or_default().value().clone();
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}

/// Cart lines whose products are locked but not yet verified.
pub struct LockedLines<'a> {
    ledger: &'a StockLedger,
    lines: Vec<CartLine>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl<'a> LockedLines<'a> {
    /// Verifies the locked lines. Dropping the error releases the locks.
    pub async fn verify(self) -> Result<StockReservation<'a>> {
        let verified = self.ledger.verify(&self.lines).await?;
        debug!(lines = verified.len(), "stock reserved");
        Ok(StockReservation {
            ledger: self.ledger,
            lines: verified,
            _guards: self.guards,
        })
    }
}

/// Verified lines whose products are locked against other checkouts.
pub struct StockReservation<'a> {
    ledger: &'a StockLedger,
    lines: Vec<VerifiedLine>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl StockReservation<'_> {
    pub fn lines(&self) -> &[VerifiedLine] {
        &self.lines
    }

    /// Moves the reserved quantities from stock to sold, all lines at once,
    /// then releases the locks.
    pub async fn commit(self) -> Result<()> {
        let adjustments: Vec<StockAdjustment> = self
            .lines
            .iter()
            .map(|line| {
                StockAdjustment::sale(line.product.id.clone(), line.product.stock, line.quantity)
            })
            .collect();
        self.ledger.products.adjust(&adjustments).await?;
        info!(lines = adjustments.len(), "stock committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::VendorId;
    use crate::domain::money::Money;
    use crate::domain::ports::ProductStore;
    use crate::infrastructure::in_memory::InMemoryProductStore;
    use rust_decimal_macros::dec;

    fn product(id: &str, stock: u32) -> Product {
        Product {
            id: ProductId::from(id),
            vendor_id: VendorId::from("v1"),
            name: id.to_uppercase(),
            image: format!("{id}.png"),
            unit_price: Money::new(dec!(10)).unwrap(),
            stock,
            sold: 0,
            active: true,
        }
    }

    fn ledger(products: Vec<Product>) -> (StockLedger, Arc<InMemoryProductStore>) {
        let store = Arc::new(InMemoryProductStore::with_products(products));
        (StockLedger::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_verify_is_all_or_nothing() {
        let (ledger, store) = ledger(vec![product("p1", 5), product("p2", 1)]);
        let lines = vec![CartLine::new("p1", 2).unwrap(), CartLine::new("p2", 3).unwrap()];

        let result = ledger.reserve(&lines).await;
        assert!(matches!(
            result,
            Err(FulfillmentError::InsufficientStock { ref product_id, available: 1, requested: 3 })
                if product_id.as_str() == "p2"
        ));
        assert_eq!(store.get(&ProductId::from("p1")).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_commit_moves_stock_to_sold() {
        let (ledger, store) = ledger(vec![product("p1", 5), product("p2", 1)]);
        let lines = vec![CartLine::new("p1", 2).unwrap(), CartLine::new("p2", 1).unwrap()];

        let reservation = ledger.reserve(&lines).await.unwrap();
        assert_eq!(reservation.lines().len(), 2);
        reservation.commit().await.unwrap();

        let p1 = store.get(&ProductId::from("p1")).await.unwrap().unwrap();
        let p2 = store.get(&ProductId::from("p2")).await.unwrap().unwrap();
        assert_eq!((p1.stock, p1.sold), (3, 2));
        assert_eq!((p2.stock, p2.sold), (0, 1));
    }

    #[tokio::test]
    async fn test_inactive_product_is_unavailable() {
        let mut inactive = product("p1", 5);
        inactive.active = false;
        let (ledger, _) = ledger(vec![inactive]);

        let result = ledger.verify(&[CartLine::new("p1", 1).unwrap()]).await;
        assert!(matches!(result, Err(FulfillmentError::ProductUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_rollback_restores_counters() {
        let (ledger, store) = ledger(vec![product("p1", 5)]);
        let lines = vec![CartLine::new("p1", 2).unwrap()];
        ledger.reserve(&lines).await.unwrap().commit().await.unwrap();

        let snapshot = OrderLineSnapshot::new(
            ProductId::from("p1"),
            "P1".to_string(),
            "p1.png".to_string(),
            Money::new(dec!(10)).unwrap(),
            2,
        );
        ledger.rollback(&[snapshot.clone()]).await.unwrap();

        let p1 = store.get(&ProductId::from("p1")).await.unwrap().unwrap();
        assert_eq!((p1.stock, p1.sold), (5, 0));

        ledger.resell(&[snapshot]).await.unwrap();
        let p1 = store.get(&ProductId::from("p1")).await.unwrap().unwrap();
        assert_eq!((p1.stock, p1.sold), (3, 2));
    }

    #[tokio::test]
    async fn test_dropped_reservation_releases_locks() {
        let (ledger, store) = ledger(vec![product("p1", 1)]);
        let lines = vec![CartLine::new("p1", 1).unwrap()];

        drop(ledger.reserve(&lines).await.unwrap());
        ledger.reserve(&lines).await.unwrap().commit().await.unwrap();

        assert_eq!(store.get(&ProductId::from("p1")).await.unwrap().unwrap().stock, 0);
    }
}
