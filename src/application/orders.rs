use super::access::Actor;
use super::ledger::StockLedger;
use crate::domain::ids::{OrderId, UserId, VendorId};
use crate::domain::order::{Order, PaymentReceipt, TrackingInfo};
use crate::domain::ports::{ClockHandle, OrderRepositoryHandle, Page};
use crate::domain::state_machine::{Effect, OrderEvent};
use crate::error::{FulfillmentError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, instrument};

/// Lifecycle requests and queries against placed orders.
///
/// Transitions on the same order are serialized by a per-order lock held
/// across load, apply and save.
pub struct OrderService {
    orders: OrderRepositoryHandle,
    ledger: Arc<StockLedger>,
    clock: ClockHandle,
    locks: DashMap<OrderId, Arc<Mutex<()>>>,
    default_page_size: u32,
}

impl OrderService {
    pub fn new(
        orders: OrderRepositoryHandle,
        ledger: Arc<StockLedger>,
        clock: ClockHandle,
        default_page_size: u32,
    ) -> Self {
        Self {
            orders,
            ledger,
            clock,
            locks: DashMap::new(),
            default_page_size,
        }
    }

    pub async fn begin_processing(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        self.transition(actor, order_id, OrderEvent::BeginProcessing)
            .await
    }

    pub async fn confirm_payment(
        &self,
        actor: &Actor,
        order_id: OrderId,
        transaction_id: Option<String>,
    ) -> Result<Order> {
        let receipt = PaymentReceipt {
            transaction_id,
            settled_at: self.clock.now(),
        };
        self.transition(
            actor,
            order_id,
            OrderEvent::ConfirmPayment {
                receipt: Some(receipt),
            },
        )
        .await
    }

    pub async fn mark_shipped(
        &self,
        actor: &Actor,
        order_id: OrderId,
        tracking: Option<TrackingInfo>,
    ) -> Result<Order> {
        self.transition(actor, order_id, OrderEvent::MarkShipped { tracking })
            .await
    }

    pub async fn mark_delivered(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        self.transition(actor, order_id, OrderEvent::MarkDelivered)
            .await
    }

    pub async fn cancel(
        &self,
        actor: &Actor,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<Order> {
        self.transition(actor, order_id, OrderEvent::Cancel { reason })
            .await
    }

    pub async fn get_order(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        let order = self.load(order_id).await?;
        actor.authorize_view(&order)?;
        Ok(order)
    }

    pub async fn list_for_user(&self, actor: &Actor, user_id: &UserId) -> Result<Vec<Order>> {
        actor.authorize_user(user_id)?;
        self.orders.find_by_user(user_id).await
    }

    pub async fn list_for_vendor(
        &self,
        actor: &Actor,
        vendor_id: &VendorId,
        page: u32,
        limit: u32,
    ) -> Result<Page<Order>> {
        actor.authorize_vendor(vendor_id)?;
        let limit = if limit == 0 {
            self.default_page_size
        } else {
            limit
        };
        self.orders.find_by_vendor(vendor_id, page, limit).await
    }

    #[instrument(skip(self, actor, event), fields(actor = %actor, event = %event.kind()))]
    async fn transition(
        &self,
        actor: &Actor,
        order_id: OrderId,
        event: OrderEvent,
    ) -> Result<Order> {
        let guard = self.lock(order_id).await;
        let result = self.apply_locked(actor, order_id, event).await;
        self.unlock(order_id, guard);
        result
    }

    async fn apply_locked(
        &self,
        actor: &Actor,
        order_id: OrderId,
        event: OrderEvent,
    ) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        actor.authorize_event(&order, event.kind())?;

        let from = order.status();
        let effect = order.apply(event, self.clock.now())?;

        // Released before saving: a failed release leaves the stored order
        // untouched.
        if effect == Effect::ReleaseStock {
            self.ledger.rollback(order.lines()).await?;
        }

        if let Err(err) = self.orders.save(order.clone()).await {
            if effect == Effect::ReleaseStock {
                error!(order = %order_id, error = %err, "failed to save cancellation, taking stock back");
                if let Err(resell_err) = self.ledger.resell(order.lines()).await {
                    error!(order = %order_id, error = %resell_err, "failed to take stock back");
                }
            }
            return Err(err);
        }

        info!(%from, to = %order.status(), "order transitioned");
        Ok(order)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })
    }

    async fn lock(&self, order_id: OrderId) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(order_id).or_default().value().clone();
        lock.lock_owned().await
    }

    /// Drops the order's lock entry unless another request is waiting on it.
    /// The map entry and `guard` are the only two owners when nobody is.
    fn unlock(&self, order_id: OrderId, guard: OwnedMutexGuard<()>) {
        self.locks
            .remove_if(&order_id, |_, lock| Arc::strong_count(lock) == 2);
        drop(guard);
    }
}
