#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use vendorflow::application::access::Actor;
use vendorflow::application::checkout::CheckoutRequest;
use vendorflow::application::engine::FulfillmentEngine;
use vendorflow::config::EngineConfig;
use vendorflow::domain::ids::{ProductId, UserId, VendorId};
use vendorflow::domain::money::Money;
use vendorflow::domain::order::{DeliveryMethod, PaymentMethod};
use vendorflow::domain::ports::ProductStore;
use vendorflow::domain::product::Product;
use vendorflow::infrastructure::clock::ManualClock;
use vendorflow::infrastructure::in_memory::{
    InMemoryCartStore, InMemoryOrderRepository, InMemoryProductStore,
};
use vendorflow::infrastructure::payment::SimulatedPaymentGateway;

pub const REQUEST_HEADER: &str =
    "op,actor,user,vendor,product,quantity,order,delivery,address,payment,note";
pub const CATALOG_HEADER: &str = "id,vendor,name,image,price,stock,sold,active";

/// An engine over in-memory adapters, with handles kept for inspection.
pub struct Harness {
    pub engine: FulfillmentEngine,
    pub products: Arc<InMemoryProductStore>,
    pub carts: Arc<InMemoryCartStore>,
    pub gateway: Arc<SimulatedPaymentGateway>,
    pub orders: Arc<InMemoryOrderRepository>,
    pub clock: Arc<ManualClock>,
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-04T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn product(id: &str, vendor: &str, price: Decimal, stock: u32) -> Product {
    Product {
        id: ProductId::from(id),
        vendor_id: VendorId::from(vendor),
        name: format!("Product {id}"),
        image: format!("{id}.png"),
        unit_price: Money::new(price).unwrap(),
        stock,
        sold: 0,
        active: true,
    }
}

pub fn harness(products: Vec<Product>) -> Harness {
    harness_with(products, SimulatedPaymentGateway::new(), EngineConfig::default())
}

pub fn harness_with(
    products: Vec<Product>,
    gateway: SimulatedPaymentGateway,
    config: EngineConfig,
) -> Harness {
    let products = Arc::new(InMemoryProductStore::with_products(products));
    let carts = Arc::new(InMemoryCartStore::new());
    let gateway = Arc::new(gateway);
    let orders = Arc::new(InMemoryOrderRepository::new());
    let clock = Arc::new(ManualClock::new(start_time()));

    let engine = FulfillmentEngine::new(
        products.clone(),
        carts.clone(),
        gateway.clone(),
        orders.clone(),
        clock.clone(),
        &config,
    );
    Harness {
        engine,
        products,
        carts,
        gateway,
        orders,
        clock,
    }
}

impl Harness {
    pub async fn add(&self, user: &str, product: &str, quantity: u32) {
        let user_id = UserId::from(user);
        self.engine
            .add_to_cart(&customer(user), &user_id, ProductId::from(product), quantity)
            .await
            .unwrap();
    }

    /// `(stock, sold)` of a product.
    pub async fn counters(&self, product: &str) -> (u32, u32) {
        let product = self
            .products
            .get(&ProductId::from(product))
            .await
            .unwrap()
            .unwrap();
        (product.stock, product.sold)
    }
}

pub fn customer(user: &str) -> Actor {
    Actor::Customer(UserId::from(user))
}

pub fn seller(vendor: &str) -> Actor {
    Actor::Vendor(VendorId::from(vendor))
}

pub fn pickup(user: &str, vendor: Option<&str>, payment_method: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest {
        user_id: UserId::from(user),
        vendor_id: vendor.map(VendorId::from),
        delivery_method: DeliveryMethod::Pickup,
        shipping_address: None,
        payment_method,
    }
}

pub fn csv_file(header: &str, rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{header}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file
}
