use crate::domain::ids::ProductId;
use crate::domain::order::OrderStatus;
use crate::domain::state_machine::OrderEventKind;
use thiserror::Error;

/// Every failure the fulfillment engine can report.
///
/// Domain variants carry structured context so callers can render their own
/// messages without matching on strings.
#[derive(Error, Debug)]
pub enum FulfillmentError {
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },
    #[error("product {product_id} is unavailable")]
    ProductUnavailable { product_id: ProductId },
    #[error("nothing selected for checkout")]
    EmptySelection,
    #[error("a shipping address is required for home delivery")]
    AddressRequired,
    #[error("cannot apply {event} to an order that is {from}")]
    InvalidTransition {
        from: OrderStatus,
        event: OrderEventKind,
    },
    #[error("payment failed: {reason}")]
    PaymentFailed { reason: String },
    #[error("payment gateway did not answer within {timeout_ms}ms")]
    PaymentTimeout { timeout_ms: u64 },
    #[error("not authorized to {action}")]
    Unauthorized { action: &'static str },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },
    #[error("invalid tax rate: {0}")]
    InvalidTaxRate(rust_decimal::Decimal),
    #[error("stock for product {product_id} changed concurrently")]
    StockConflict { product_id: ProductId },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for FulfillmentError {
    fn from(err: rocksdb::Error) -> Self {
        FulfillmentError::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, FulfillmentError>;
