use super::ids::{ProductId, VendorId};
use super::money::Money;
use serde::{Deserialize, Serialize};

/// A catalog product as seen by the fulfillment engine.
///
/// The catalog owns products; this engine only reads the display fields and
/// mutates the `stock`/`sold` counters through the stock ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub vendor_id: VendorId,
    pub name: String,
    pub image: String,
    pub unit_price: Money,
    pub stock: u32,
    pub sold: u32,
    pub active: bool,
}

impl Product {
    /// Whether `quantity` units can be sold right now.
    pub fn can_supply(&self, quantity: u32) -> bool {
        self.active && self.stock >= quantity
    }

    /// Units that can still be sold. Inactive products have none.
    pub fn available(&self) -> u32 {
        if self.active { self.stock } else { 0 }
    }
}

/// A signed change to a product's counters, applied all-or-nothing by a
/// [`ProductStore`](super::ports::ProductStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    /// Stock the caller observed while holding the product lock. The store
    /// refuses the adjustment if the counter moved since.
    pub expected_stock: u32,
    pub stock_delta: i64,
    pub sold_delta: i64,
}

impl StockAdjustment {
    pub fn sale(product_id: ProductId, expected_stock: u32, quantity: u32) -> Self {
        Self {
            product_id,
            expected_stock,
            stock_delta: -i64::from(quantity),
            sold_delta: i64::from(quantity),
        }
    }

    pub fn restock(product_id: ProductId, expected_stock: u32, quantity: u32) -> Self {
        Self {
            product_id,
            expected_stock,
            stock_delta: i64::from(quantity),
            sold_delta: -i64::from(quantity),
        }
    }

    /// Counters after applying this adjustment, or `None` if either would go
    /// negative or overflow.
    pub fn apply_to(&self, stock: u32, sold: u32) -> Option<(u32, u32)> {
        let stock = u32::try_from(i64::from(stock) + self.stock_delta).ok()?;
        let sold = u32::try_from(i64::from(sold) + self.sold_delta).ok()?;
        Some((stock, sold))
    }
}
