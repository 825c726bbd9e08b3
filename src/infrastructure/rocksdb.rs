use crate::domain::ids::{OrderId, UserId, VendorId};
use crate::domain::order::Order;
use crate::domain::ports::{OrderRepository, Page};
use crate::error::{FulfillmentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family holding orders as JSON, keyed by the order uuid bytes.
pub const CF_ORDERS: &str = "orders";

/// A durable order repository backed by RocksDB.
///
/// `Clone` shares the underlying `Arc<DB>`. User and vendor listings scan the
/// column family; there are no secondary indexes.
#[derive(Clone)]
pub struct RocksDBOrderRepository {
    db: Arc<DB>,
}

impl RocksDBOrderRepository {
    /// Opens or creates a RocksDB instance at `path` with the `orders`
    /// column family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn orders_cf(&self) -> Result<&ColumnFamily> {
        self.db.cf_handle(CF_ORDERS).ok_or_else(|| {
            FulfillmentError::InternalError(Box::new(std::io::Error::other(
                "Orders column family not found",
            )))
        })
    }

    fn newest_first<F>(&self, keep: F) -> Result<Vec<Order>>
    where
        F: Fn(&Order) -> bool,
    {
        let cf = self.orders_cf()?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let order: Order = serde_json::from_slice(&value)?;
            if keep(&order) {
                orders.push(order);
            }
        }
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.reference().cmp(a.reference()))
        });
        Ok(orders)
    }
}

#[async_trait]
impl OrderRepository for RocksDBOrderRepository {
    async fn save(&self, order: Order) -> Result<()> {
        let cf = self.orders_cf()?;
        let value = serde_json::to_vec(&order)?;
        self.db.put_cf(cf, order.id().as_bytes(), value)?;
        Ok(())
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let cf = self.orders_cf()?;
        match self.db.get_pinned_cf(cf, order_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        self.newest_first(|order| order.user_id() == user_id)
    }

    async fn find_by_vendor(
        &self,
        vendor_id: &VendorId,
        page: u32,
        limit: u32,
    ) -> Result<Page<Order>> {
        let all = self.newest_first(|order| order.vendor_id() == vendor_id)?;
        Ok(Page::from_sorted(all, page, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PaymentMethod;
    use crate::domain::order::fixtures::order_with;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let repo = RocksDBOrderRepository::open(dir.path()).expect("Failed to open RocksDB");
        assert!(repo.db.cf_handle(CF_ORDERS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_order_roundtrip() {
        let dir = tempdir().unwrap();
        let repo = RocksDBOrderRepository::open(dir.path()).unwrap();
        let order = order_with(PaymentMethod::BankTransfer);

        repo.save(order.clone()).await.unwrap();
        assert_eq!(repo.find_by_id(order.id()).await.unwrap(), Some(order.clone()));
        assert!(repo.find_by_id(OrderId::generate()).await.unwrap().is_none());

        let mine = repo.find_by_user(order.user_id()).await.unwrap();
        assert_eq!(mine, vec![order.clone()]);

        let page = repo.find_by_vendor(order.vendor_id(), 1, 5).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].reference(), order.reference());
    }
}
