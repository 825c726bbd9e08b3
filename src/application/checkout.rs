use super::factory::{OrderFactory, OrderIdentity, OrderSpec, PriceBreakdown};
use super::idempotency::{IntentCache, IntentKey, IntentState};
use super::ledger::StockLedger;
use super::splitter::{BucketKey, VendorBuckets, VendorSplitter};
use crate::config::EngineConfig;
use crate::domain::cart::CartLine;
use crate::domain::ids::{OrderId, ProductId, UserId, VendorId};
use crate::domain::money::Money;
use crate::domain::order::{
    DeliveryMethod, Order, PaymentMethod, PaymentReceipt, ShippingAddress,
};
use crate::domain::ports::{
    CartStoreHandle, ChargeOutcome, ChargeRequest, ClockHandle, OrderRepositoryHandle,
    PaymentGatewayHandle, ProductStoreHandle,
};
use crate::domain::product::Product;
use crate::domain::state_machine::OrderEvent;
use crate::error::{FulfillmentError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    /// `None` checks out every vendor in the cart, one order each.
    pub vendor_id: Option<VendorId>,
    pub delivery_method: DeliveryMethod,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: PaymentMethod,
}

#[derive(Debug)]
pub struct BucketFailure {
    pub vendor_id: VendorId,
    pub error: FulfillmentError,
}

/// Orders placed by one checkout, plus the vendor buckets that failed after
/// at least one sibling succeeded.
#[derive(Debug, Default)]
pub struct CheckoutReceipt {
    pub orders: Vec<Order>,
    /// Ids among `orders` that an earlier submission of the same purchase
    /// already placed. Nothing was charged or committed for them this time.
    pub replayed: Vec<OrderId>,
    pub failures: Vec<BucketFailure>,
}

impl CheckoutReceipt {
    pub fn is_replay(&self, order_id: OrderId) -> bool {
        self.replayed.contains(&order_id)
    }
}

/// What a single vendor bucket produced.
enum BucketOutcome {
    Placed(Order),
    Replayed(Order),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorQuote {
    pub vendor_id: VendorId,
    pub lines: Vec<QuoteLine>,
    pub price: PriceBreakdown,
}

/// Side-effect-free preview of what a checkout would charge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartQuote {
    pub vendors: Vec<VendorQuote>,
    pub unavailable: Vec<ProductId>,
    pub grand_total: Money,
}

/// Turns a shopper's cart into paid, stock-committed, vendor-scoped orders.
pub struct CheckoutOrchestrator {
    products: ProductStoreHandle,
    carts: CartStoreHandle,
    gateway: PaymentGatewayHandle,
    orders: OrderRepositoryHandle,
    clock: ClockHandle,
    ledger: Arc<StockLedger>,
    factory: OrderFactory,
    intents: IntentCache,
    payment_timeout: Duration,
    idempotency_window: Duration,
}

impl CheckoutOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        products: ProductStoreHandle,
        carts: CartStoreHandle,
        gateway: PaymentGatewayHandle,
        orders: OrderRepositoryHandle,
        clock: ClockHandle,
        ledger: Arc<StockLedger>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            products,
            carts,
            gateway,
            orders,
            clock,
            ledger,
            factory: OrderFactory::from_config(config),
            intents: IntentCache::new(),
            payment_timeout: config.payment_timeout(),
            idempotency_window: config.idempotency_window(),
        }
    }

    /// Executes one checkout request end to end.
    ///
    /// Validation, product resolution and a first stock check run for every
    /// selected bucket before anything is charged, so any of those failures
    /// leaves no trace. Buckets are then processed one at a time, each as its
    /// own atomic unit.
    #[instrument(skip(self, request), fields(user = %request.user_id, vendor = ?request.vendor_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        let address = OrderFactory::validate_delivery(
            request.delivery_method,
            request.shipping_address.as_ref(),
        )?;

        let cart = self.carts.lines(&request.user_id).await?;
        let (buckets, _) = self.split(&cart).await?;
        let target = request.vendor_id.clone().map(BucketKey::Vendor);
        let selected = buckets.select_for_checkout(target.as_ref())?;

        if !buckets.unavailable().is_empty() {
            warn!(
                lines = buckets.unavailable().len(),
                "skipping cart lines whose product no longer exists"
            );
        }

        for (_, lines) in &selected {
            self.ledger.verify(lines).await?;
        }

        self.intents
            .cleanup(self.clock.now(), self.idempotency_window * 2);

        let mut receipt = CheckoutReceipt::default();
        for (vendor_id, lines) in selected {
            let spec = OrderSpec {
                user_id: &request.user_id,
                vendor_id: &vendor_id,
                delivery_method: request.delivery_method,
                shipping_address: address,
                payment_method: request.payment_method,
            };
            let placed = self.checkout_bucket(&spec, &lines).await;
            match placed {
                Ok(BucketOutcome::Placed(order)) => receipt.orders.push(order),
                Ok(BucketOutcome::Replayed(order)) => {
                    receipt.replayed.push(order.id());
                    receipt.orders.push(order);
                }
                Err(error) => {
                    warn!(vendor = %vendor_id, %error, "vendor checkout failed");
                    receipt.failures.push(BucketFailure { vendor_id, error });
                }
            }
        }

        if receipt.orders.is_empty() && !receipt.failures.is_empty() {
            return Err(receipt.failures.swap_remove(0).error);
        }

        info!(
            orders = receipt.orders.len(),
            replayed = receipt.replayed.len(),
            failures = receipt.failures.len(),
            "checkout finished"
        );
        Ok(receipt)
    }

    /// Prices the cart the way [`checkout`](Self::checkout) would, without
    /// touching stock, payment or the cart.
    pub async fn quote(
        &self,
        user_id: &UserId,
        vendor_id: Option<&VendorId>,
        delivery_method: DeliveryMethod,
    ) -> Result<CartQuote> {
        let cart = self.carts.lines(user_id).await?;
        let (buckets, catalog) = self.split(&cart).await?;
        let target = vendor_id.cloned().map(BucketKey::Vendor);
        let selected = buckets.select_for_checkout(target.as_ref())?;

        let mut vendors = Vec::with_capacity(selected.len());
        for (vendor_id, lines) in selected {
            let lines: Vec<QuoteLine> = lines
                .iter()
                .filter_map(|line| {
                    catalog.get(line.product_id()).map(|product| QuoteLine {
                        product_id: product.id.clone(),
                        name: product.name.clone(),
                        unit_price: product.unit_price,
                        quantity: line.quantity(),
                        line_total: product.unit_price.times(line.quantity()),
                    })
                })
                .collect();
            let subtotal = lines.iter().map(|line| line.line_total).sum();
            vendors.push(VendorQuote {
                vendor_id,
                lines,
                price: self.factory.price(subtotal, delivery_method),
            });
        }

        Ok(CartQuote {
            grand_total: vendors.iter().map(|vendor| vendor.price.total).sum(),
            unavailable: buckets
                .unavailable()
                .iter()
                .map(|line| line.product_id().clone())
                .collect(),
            vendors,
        })
    }

    async fn split(
        &self,
        cart: &[CartLine],
    ) -> Result<(VendorBuckets, HashMap<ProductId, Product>)> {
        let mut catalog = HashMap::with_capacity(cart.len());
        for line in cart {
            if let Some(product) = self.products.get(line.product_id()).await? {
                catalog.insert(product.id.clone(), product);
            }
        }
        let buckets = VendorSplitter::split(cart, |product_id| {
            catalog.get(product_id).map(|product| product.vendor_id.clone())
        });
        Ok((buckets, catalog))
    }

    #[instrument(skip(self, spec, lines), fields(vendor = %spec.vendor_id))]
    async fn checkout_bucket(
        &self,
        spec: &OrderSpec<'_>,
        lines: &[CartLine],
    ) -> Result<BucketOutcome> {
        let now = self.clock.now();
        let key = IntentKey::derive(
            spec.user_id,
            spec.vendor_id,
            lines,
            now,
            self.idempotency_window,
        );

        // Looked up under the product locks so a duplicate submission waits for
        // the first one and then sees its result.
        let locked = self.ledger.lock(lines).await;
        let identity = match self.intents.get(&key) {
            Some(IntentState::Completed(order_id)) => {
                // A cancelled order no longer stands for this purchase.
                match self.orders.find_by_id(order_id).await? {
                    Some(order) if order.is_active() => {
                        info!(order = %order.id(), "checkout retry matched a placed order");
                        return Ok(BucketOutcome::Replayed(order));
                    }
                    _ => {
                        self.intents.forget(&key);
                        OrderIdentity::generate(now)
                    }
                }
            }
            Some(IntentState::AwaitingPayment(identity)) => {
                info!(order = %identity.id, "retrying checkout after payment timeout");
                identity
            }
            None => OrderIdentity::generate(now),
        };

        let reservation = locked.verify().await?;
        let mut order = self
            .factory
            .build(identity.clone(), spec, reservation.lines(), now)?;

        let charge = ChargeRequest {
            order_id: order.id(),
            reference: order.reference().to_string(),
            user_id: spec.user_id.clone(),
            vendor_id: spec.vendor_id.clone(),
            amount: order.total(),
            method: spec.payment_method,
            // Scoped to the order identity so a retry shares it and a fresh
            // order after a cancellation does not.
            idempotency_key: format!("{}|{}", key.as_str(), order.id()),
        };

        let charged = tokio::time::timeout(self.payment_timeout, self.gateway.charge(&charge));
        let outcome = match charged.await {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!(order = %order.id(), "payment gateway timed out");
                self.intents
                    .record(key, IntentState::AwaitingPayment(identity), now);
                return Err(FulfillmentError::PaymentTimeout {
                    timeout_ms: u64::try_from(self.payment_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                });
            }
        };

        let (transaction_id, settled) = match outcome {
            ChargeOutcome::Approved {
                transaction_id,
                settled,
            } => (transaction_id, settled),
            ChargeOutcome::Declined { reason } => {
                self.intents.forget(&key);
                return Err(FulfillmentError::PaymentFailed { reason });
            }
        };

        reservation.commit().await?;

        if settled {
            order.apply(
                OrderEvent::ConfirmPayment {
                    receipt: Some(PaymentReceipt {
                        transaction_id,
                        settled_at: now,
                    }),
                },
                now,
            )?;
        }

        if let Err(err) = self.orders.save(order.clone()).await {
            error!(order = %order.id(), error = %err, "failed to save order, releasing stock");
            if let Err(rollback_err) = self.ledger.rollback(order.lines()).await {
                error!(order = %order.id(), error = %rollback_err, "failed to release stock");
            }
            return Err(err);
        }

        let purchased: Vec<ProductId> = order
            .lines()
            .iter()
            .map(|line| line.product_id().clone())
            .collect();
        self.carts.remove_lines(spec.user_id, &purchased).await?;

        self.intents
            .record(key, IntentState::Completed(order.id()), now);
        info!(
            order = %order.id(),
            reference = order.reference(),
            total = %order.total(),
            paid = order.is_paid(),
            "order placed"
        );
        Ok(BucketOutcome::Placed(order))
    }
}
