use crate::domain::order::{DeliveryMethod, PaymentMethod};
use crate::error::{FulfillmentError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestOp {
    Add,
    Checkout,
    Begin,
    Pay,
    Ship,
    Deliver,
    Cancel,
}

/// One row of a request script.
///
/// `order` is the 1-based sequence number of an order placed earlier in the
/// same run. Columns an operation does not use are left empty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestRecord {
    pub op: RequestOp,
    pub actor: String,
    pub user: Option<String>,
    pub vendor: Option<String>,
    pub product: Option<String>,
    pub quantity: Option<u32>,
    pub order: Option<usize>,
    pub delivery: Option<DeliveryMethod>,
    pub address: Option<String>,
    pub payment: Option<PaymentMethod>,
    pub note: Option<String>,
}

/// Reads request records from a CSV source.
///
/// Header: `op,actor,user,vendor,product,quantity,order,delivery,address,payment,note`.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn requests(self) -> impl Iterator<Item = Result<RequestRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(FulfillmentError::from))
    }
}
