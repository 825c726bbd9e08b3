use super::csv::request_reader::{RequestOp, RequestRecord};
use crate::application::access::Actor;
use crate::application::checkout::CheckoutRequest;
use crate::application::engine::FulfillmentEngine;
use crate::domain::ids::{OrderId, ProductId, UserId, VendorId};
use crate::domain::order::{DeliveryMethod, Order, PaymentMethod, ShippingAddress, TrackingInfo};
use crate::error::{FulfillmentError, Result};
use tracing::{info, warn};

/// Replays request records against a [`FulfillmentEngine`].
///
/// Orders are numbered in the order they are placed, starting at 1, so later
/// rows can refer to them without knowing their generated ids.
pub struct RequestRunner<'a> {
    engine: &'a FulfillmentEngine,
    placed: Vec<OrderId>,
}

impl<'a> RequestRunner<'a> {
    pub fn new(engine: &'a FulfillmentEngine) -> Self {
        Self {
            engine,
            placed: Vec::new(),
        }
    }

    /// Applies one record. A failed request leaves earlier results intact.
    pub async fn apply(&mut self, record: RequestRecord) -> Result<()> {
        let actor: Actor = record.actor.parse()?;
        match record.op {
            RequestOp::Add => {
                let user = required_user(&record)?;
                let product = required(record.product.clone(), "product")?;
                let quantity = required(record.quantity, "quantity")?;
                self.engine
                    .add_to_cart(&actor, &user, ProductId::from(product), quantity)
                    .await
            }
            RequestOp::Checkout => {
                let request = CheckoutRequest {
                    user_id: required_user(&record)?,
                    vendor_id: record.vendor.clone().map(VendorId::from),
                    delivery_method: record.delivery.unwrap_or(DeliveryMethod::Pickup),
                    shipping_address: record.address.clone().map(ShippingAddress::street_only),
                    payment_method: record.payment.unwrap_or(PaymentMethod::Card),
                };
                let receipt = self.engine.checkout(&actor, request).await?;
                for failure in &receipt.failures {
                    warn!(vendor = %failure.vendor_id, error = %failure.error, "vendor order not placed");
                }
                for order in receipt.orders {
                    if !self.placed.contains(&order.id()) {
                        self.placed.push(order.id());
                        info!(seq = self.placed.len(), reference = order.reference(), "order placed");
                    }
                }
                Ok(())
            }
            RequestOp::Begin => {
                let order_id = self.order_ref(&record)?;
                self.engine.begin_processing(&actor, order_id).await.map(drop)
            }
            RequestOp::Pay => {
                let order_id = self.order_ref(&record)?;
                self.engine
                    .confirm_payment(&actor, order_id, record.note)
                    .await
                    .map(drop)
            }
            RequestOp::Ship => {
                let order_id = self.order_ref(&record)?;
                let tracking = record.note.as_deref().map(parse_tracking);
                self.engine
                    .mark_shipped(&actor, order_id, tracking)
                    .await
                    .map(drop)
            }
            RequestOp::Deliver => {
                let order_id = self.order_ref(&record)?;
                self.engine.mark_delivered(&actor, order_id).await.map(drop)
            }
            RequestOp::Cancel => {
                let order_id = self.order_ref(&record)?;
                self.engine
                    .cancel(&actor, order_id, record.note)
                    .await
                    .map(drop)
            }
        }
    }

    /// Current state of every order placed during the run, in placement order.
    pub async fn placed_orders(&self) -> Result<Vec<Order>> {
        let mut orders = Vec::with_capacity(self.placed.len());
        for order_id in &self.placed {
            orders.push(self.engine.get_order(&Actor::Admin, *order_id).await?);
        }
        Ok(orders)
    }

    fn order_ref(&self, record: &RequestRecord) -> Result<OrderId> {
        let seq = required(record.order, "order")?;
        seq.checked_sub(1)
            .and_then(|index| self.placed.get(index))
            .copied()
            .ok_or_else(|| FulfillmentError::NotFound {
                entity: "order",
                id: format!("#{seq}"),
            })
    }
}

fn required<T>(value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| FulfillmentError::ValidationError(format!("missing {column} column")))
}

fn required_user(record: &RequestRecord) -> Result<UserId> {
    required(record.user.clone(), "user").map(UserId::from)
}

/// `carrier:number`, or just a tracking number.
fn parse_tracking(note: &str) -> TrackingInfo {
    match note.split_once(':') {
        Some((carrier, number)) => TrackingInfo {
            tracking_number: Some(number.trim().to_string()),
            carrier: Some(carrier.trim().to_string()),
        },
        None => TrackingInfo {
            tracking_number: Some(note.trim().to_string()),
            carrier: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::order::OrderStatus;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::in_memory::{
        InMemoryCartStore, InMemoryOrderRepository, InMemoryProductStore,
    };
    use crate::infrastructure::payment::SimulatedPaymentGateway;
    use crate::interfaces::csv::catalog_reader::CatalogReader;
    use crate::interfaces::csv::request_reader::RequestReader;
    use std::sync::Arc;

    const CATALOG: &str = "id,vendor,name,image,price,stock,sold,active\n\
                           p1,v1,Mug,,10,5,0,true\n\
                           p2,v2,Lamp,,40,1,0,true";

    fn engine() -> FulfillmentEngine {
        let products: Vec<_> = CatalogReader::new(CATALOG.as_bytes())
            .products()
            .collect::<Result<_>>()
            .unwrap();
        FulfillmentEngine::new(
            Arc::new(InMemoryProductStore::with_products(products)),
            Arc::new(InMemoryCartStore::new()),
            Arc::new(SimulatedPaymentGateway::new()),
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(SystemClock),
            &EngineConfig::default(),
        )
    }

    async fn run(engine: &FulfillmentEngine, script: &str) -> (Vec<Order>, usize) {
        let mut runner = RequestRunner::new(engine);
        let mut failed = 0;
        for record in RequestReader::new(script.as_bytes()).requests() {
            if runner.apply(record.unwrap()).await.is_err() {
                failed += 1;
            }
        }
        (runner.placed_orders().await.unwrap(), failed)
    }

    #[tokio::test]
    async fn test_script_places_and_ships() {
        let engine = engine();
        let script = "op,actor,user,vendor,product,quantity,order,delivery,address,payment,note\n\
                      add,customer:u1,u1,,p1,2,,,,,\n\
                      add,customer:u1,u1,,p2,1,,,,,\n\
                      checkout,customer:u1,u1,,,,,,,card,\n\
                      ship,vendor:v1,,,,,1,,,,DHL:123\n\
                      deliver,vendor:v1,,,,,1,,,,\n\
                      cancel,customer:u1,,,,,2,,,,too slow";
        let (orders, failed) = run(&engine, script).await;

        assert_eq!(failed, 0);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].vendor_id(), &VendorId::from("v1"));
        assert_eq!(orders[0].status(), OrderStatus::Delivered);
        assert_eq!(orders[0].tracking().unwrap().carrier.as_deref(), Some("DHL"));
        assert_eq!(orders[1].status(), OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_script_failures_do_not_stop_the_run() {
        let engine = engine();
        let script = "op,actor,user,vendor,product,quantity,order,delivery,address,payment,note\n\
                      add,customer:u1,u1,,p2,2,,,,,\n\
                      checkout,customer:u1,u1,,,,,,,card,\n\
                      deliver,vendor:v1,,,,,7,,,,\n\
                      add,customer:u1,u1,,p2,1,,,,,\n\
                      checkout,customer:u1,u1,,,,,home,,card,\n\
                      checkout,customer:u1,u1,,,,,,,card,";
        let (orders, failed) = run(&engine, script).await;

        assert_eq!(failed, 3);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status(), OrderStatus::Processing);
    }
}
