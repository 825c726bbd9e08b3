use crate::domain::ids::{ProductId, VendorId};
use crate::domain::money::Money;
use crate::domain::product::Product;
use crate::error::{FulfillmentError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    id: ProductId,
    vendor: VendorId,
    name: String,
    #[serde(default)]
    image: String,
    price: Money,
    stock: u32,
    #[serde(default)]
    sold: u32,
    #[serde(default = "active_by_default")]
    active: bool,
}

fn active_by_default() -> bool {
    true
}

impl From<CatalogRecord> for Product {
    fn from(record: CatalogRecord) -> Self {
        Product {
            id: record.id,
            vendor_id: record.vendor,
            name: record.name,
            image: record.image,
            unit_price: record.price,
            stock: record.stock,
            sold: record.sold,
            active: record.active,
        }
    }
}

/// Reads catalog products from a CSV source.
///
/// Expected header: `id,vendor,name,image,price,stock,sold,active`. The
/// `image`, `sold` and `active` columns may be left empty.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one product per row.
    pub fn products(self) -> impl Iterator<Item = Result<Product>> {
        self.reader
            .into_deserialize::<CatalogRecord>()
            .map(|result| result.map(Product::from).map_err(FulfillmentError::from))
    }
}
