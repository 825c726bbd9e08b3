use super::access::Actor;
use super::checkout::{CartQuote, CheckoutOrchestrator, CheckoutReceipt, CheckoutRequest};
use super::ledger::StockLedger;
use super::orders::OrderService;
use crate::config::EngineConfig;
use crate::domain::cart::CartLine;
use crate::domain::ids::{OrderId, ProductId, UserId, VendorId};
use crate::domain::order::{DeliveryMethod, Order, TrackingInfo};
use crate::domain::ports::{
    CartStoreHandle, ClockHandle, OrderRepositoryHandle, Page, PaymentGatewayHandle,
    ProductStoreHandle,
};
use crate::domain::product::Product;
use crate::error::{FulfillmentError, Result};
use std::sync::Arc;

/// The main entry point of the fulfillment engine.
///
/// `FulfillmentEngine` owns the storage and payment collaborators and exposes
/// the request surface: cart edits, checkout, order lifecycle transitions and
/// order queries. Every request names the [`Actor`] making it.
pub struct FulfillmentEngine {
    products: ProductStoreHandle,
    carts: CartStoreHandle,
    checkout: CheckoutOrchestrator,
    orders: OrderService,
}

impl FulfillmentEngine {
    /// Creates a new `FulfillmentEngine`.
    ///
    /// # Arguments
    ///
    /// * `products` - Catalog reads and stock counters.
    /// * `carts` - Per-user cart lines.
    /// * `gateway` - The payment collaborator charged at checkout.
    /// * `orders` - Where placed orders are persisted.
    /// * `clock` - Source of every timestamp the engine records.
    /// * `config` - Pricing, timeout and paging settings.
    pub fn new(
        products: ProductStoreHandle,
        carts: CartStoreHandle,
        gateway: PaymentGatewayHandle,
        orders: OrderRepositoryHandle,
        clock: ClockHandle,
        config: &EngineConfig,
    ) -> Self {
        let ledger = Arc::new(StockLedger::new(products.clone()));
        let checkout = CheckoutOrchestrator::new(
            products.clone(),
            carts.clone(),
            gateway,
            orders.clone(),
            clock.clone(),
            ledger.clone(),
            config,
        );
        let orders = OrderService::new(orders, ledger, clock, config.default_page_size);
        Self {
            products,
            carts,
            checkout,
            orders,
        }
    }

    /// Puts `quantity` of a product in the user's cart, replacing any earlier
    /// line for the same product.
    pub async fn add_to_cart(
        &self,
        actor: &Actor,
        user_id: &UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<()> {
        actor.authorize_user(user_id)?;
        if self.products.get(&product_id).await?.is_none() {
            return Err(FulfillmentError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            });
        }
        let line = CartLine::new(product_id, quantity)?;
        self.carts.put_line(user_id, line).await
    }

    pub async fn cart(&self, actor: &Actor, user_id: &UserId) -> Result<Vec<CartLine>> {
        actor.authorize_user(user_id)?;
        self.carts.lines(user_id).await
    }

    pub async fn checkout(&self, actor: &Actor, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        actor.authorize_user(&request.user_id)?;
        self.checkout.checkout(request).await
    }

    pub async fn quote(
        &self,
        actor: &Actor,
        user_id: &UserId,
        vendor_id: Option<&VendorId>,
        delivery_method: DeliveryMethod,
    ) -> Result<CartQuote> {
        actor.authorize_user(user_id)?;
        self.checkout.quote(user_id, vendor_id, delivery_method).await
    }

    pub async fn begin_processing(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        self.orders.begin_processing(actor, order_id).await
    }

    pub async fn confirm_payment(
        &self,
        actor: &Actor,
        order_id: OrderId,
        transaction_id: Option<String>,
    ) -> Result<Order> {
        self.orders
            .confirm_payment(actor, order_id, transaction_id)
            .await
    }

    pub async fn mark_shipped(
        &self,
        actor: &Actor,
        order_id: OrderId,
        tracking: Option<TrackingInfo>,
    ) -> Result<Order> {
        self.orders.mark_shipped(actor, order_id, tracking).await
    }

    pub async fn mark_delivered(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        self.orders.mark_delivered(actor, order_id).await
    }

    pub async fn cancel(
        &self,
        actor: &Actor,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<Order> {
        self.orders.cancel(actor, order_id, reason).await
    }

    pub async fn get_order(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        self.orders.get_order(actor, order_id).await
    }

    pub async fn list_my_orders(&self, actor: &Actor, user_id: &UserId) -> Result<Vec<Order>> {
        self.orders.list_for_user(actor, user_id).await
    }

    pub async fn list_vendor_orders(
        &self,
        actor: &Actor,
        vendor_id: &VendorId,
        page: u32,
        limit: u32,
    ) -> Result<Page<Order>> {
        self.orders
            .list_for_vendor(actor, vendor_id, page, limit)
            .await
    }

    /// Current catalog counters, sorted by product id.
    pub async fn stock_levels(&self) -> Result<Vec<Product>> {
        let mut products = self.products.all_products().await?;
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use crate::domain::order::{OrderStatus, PaymentMethod};
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::in_memory::{
        InMemoryCartStore, InMemoryOrderRepository, InMemoryProductStore,
    };
    use crate::infrastructure::payment::SimulatedPaymentGateway;
    use rust_decimal_macros::dec;

    fn product(id: &str, vendor: &str, price: rust_decimal::Decimal, stock: u32) -> Product {
        Product {
            id: ProductId::from(id),
            vendor_id: VendorId::from(vendor),
            name: id.to_uppercase(),
            image: format!("{id}.png"),
            unit_price: Money::new(price).unwrap(),
            stock,
            sold: 0,
            active: true,
        }
    }

    fn engine(products: Vec<Product>) -> FulfillmentEngine {
        FulfillmentEngine::new(
            Arc::new(InMemoryProductStore::with_products(products)),
            Arc::new(InMemoryCartStore::new()),
            Arc::new(SimulatedPaymentGateway::new()),
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(SystemClock),
            &EngineConfig::default(),
        )
    }

    fn pickup(user: &UserId, method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest {
            user_id: user.clone(),
            vendor_id: None,
            delivery_method: DeliveryMethod::Pickup,
            shipping_address: None,
            payment_method: method,
        }
    }

    #[tokio::test]
    async fn test_add_to_cart_rules() {
        let engine = engine(vec![product("p1", "v1", dec!(10), 5)]);
        let user = UserId::from("u1");
        let customer = Actor::Customer(user.clone());

        engine
            .add_to_cart(&customer, &user, ProductId::from("p1"), 2)
            .await
            .unwrap();
        engine
            .add_to_cart(&customer, &user, ProductId::from("p1"), 3)
            .await
            .unwrap();
        let cart = engine.cart(&customer, &user).await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity(), 3);

        assert!(matches!(
            engine
                .add_to_cart(&customer, &user, ProductId::from("p1"), 0)
                .await,
            Err(FulfillmentError::InvalidQuantity { quantity: 0 })
        ));
        assert!(matches!(
            engine
                .add_to_cart(&customer, &user, ProductId::from("nope"), 1)
                .await,
            Err(FulfillmentError::NotFound { .. })
        ));
        assert!(matches!(
            engine
                .add_to_cart(
                    &Actor::Customer(UserId::from("u2")),
                    &user,
                    ProductId::from("p1"),
                    1
                )
                .await,
            Err(FulfillmentError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_full_lifecycle_through_engine() {
        let engine = engine(vec![product("p1", "v1", dec!(25), 4)]);
        let user = UserId::from("u1");
        let customer = Actor::Customer(user.clone());
        let seller = Actor::Vendor(VendorId::from("v1"));

        engine
            .add_to_cart(&customer, &user, ProductId::from("p1"), 2)
            .await
            .unwrap();
        let receipt = engine
            .checkout(&customer, pickup(&user, PaymentMethod::Card))
            .await
            .unwrap();
        let order_id = receipt.orders[0].id();
        assert!(receipt.orders[0].is_paid());
        assert_eq!(receipt.orders[0].status(), OrderStatus::Processing);

        assert!(matches!(
            engine.mark_shipped(&customer, order_id, None).await,
            Err(FulfillmentError::Unauthorized { .. })
        ));
        let shipped = engine
            .mark_shipped(
                &seller,
                order_id,
                Some(TrackingInfo {
                    tracking_number: Some("TRK-1".into()),
                    carrier: Some("Post".into()),
                }),
            )
            .await
            .unwrap();
        assert_eq!(shipped.status(), OrderStatus::Shipped);
        assert_eq!(
            shipped.tracking().unwrap().tracking_number.as_deref(),
            Some("TRK-1")
        );

        let delivered = engine.mark_delivered(&seller, order_id).await.unwrap();
        assert_eq!(delivered.status(), OrderStatus::Delivered);
        assert!(delivered.delivered_at().is_some());

        let mine = engine.list_my_orders(&customer, &user).await.unwrap();
        assert_eq!(mine.len(), 1);
        let page = engine
            .list_vendor_orders(&seller, &VendorId::from("v1"), 1, 0)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, 10);

        let stock = engine.stock_levels().await.unwrap();
        assert_eq!((stock[0].stock, stock[0].sold), (2, 2));
    }

    #[tokio::test]
    async fn test_cancel_restores_stock() {
        let engine = engine(vec![product("p1", "v1", dec!(25), 4)]);
        let user = UserId::from("u1");
        let customer = Actor::Customer(user.clone());

        engine
            .add_to_cart(&customer, &user, ProductId::from("p1"), 3)
            .await
            .unwrap();
        let receipt = engine
            .checkout(&customer, pickup(&user, PaymentMethod::BankTransfer))
            .await
            .unwrap();
        let order = &receipt.orders[0];
        assert!(!order.is_paid());
        assert_eq!(order.status(), OrderStatus::Pending);

        let cancelled = engine
            .cancel(&customer, order.id(), Some("changed my mind".into()))
            .await
            .unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert!(!cancelled.is_active());
        assert!(cancelled.notes().unwrap().contains("changed my mind"));

        let stock = engine.stock_levels().await.unwrap();
        assert_eq!((stock[0].stock, stock[0].sold), (4, 0));

        assert!(matches!(
            engine.cancel(&customer, order.id(), None).await,
            Err(FulfillmentError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let engine = engine(vec![]);
        let result = engine.get_order(&Actor::Admin, OrderId::generate()).await;
        assert!(matches!(
            result,
            Err(FulfillmentError::NotFound { entity: "order", .. })
        ));
    }
}
