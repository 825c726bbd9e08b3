use super::ids::ProductId;
use crate::error::{FulfillmentError, Result};
use serde::{Deserialize, Serialize};

/// One product in a shopper's cart. A quantity of zero means the line is absent,
/// so it is never constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartLine {
    product_id: ProductId,
    quantity: u32,
}

impl CartLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Result<Self> {
        if quantity == 0 {
            return Err(FulfillmentError::InvalidQuantity { quantity });
        }
        Ok(Self {
            product_id: product_id.into(),
            quantity,
        })
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}
