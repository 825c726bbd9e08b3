//! Lifecycle rules for [`Order`].
//!
//! ```text
//! Pending    --BeginProcessing--> Processing
//! Pending    --ConfirmPayment---> Processing   (Delivered for cash on delivery)
//! Processing --ConfirmPayment---> Processing   (Delivered for cash on delivery)
//! Processing --MarkShipped------> Shipped      (paid orders only)
//! Shipped    --MarkDelivered----> Delivered
//! Pending | Processing --Cancel--> Cancelled
//! ```
//!
//! A rejected event leaves the order untouched.

use super::order::{Order, OrderStatus, PaymentReceipt, TrackingInfo};
use crate::error::{FulfillmentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEvent {
    /// The vendor acknowledged the order and started preparing it.
    BeginProcessing,
    ConfirmPayment { receipt: Option<PaymentReceipt> },
    MarkShipped { tracking: Option<TrackingInfo> },
    MarkDelivered,
    Cancel { reason: Option<String> },
}

impl OrderEvent {
    pub fn kind(&self) -> OrderEventKind {
        match self {
            OrderEvent::BeginProcessing => OrderEventKind::BeginProcessing,
            OrderEvent::ConfirmPayment { .. } => OrderEventKind::ConfirmPayment,
            OrderEvent::MarkShipped { .. } => OrderEventKind::MarkShipped,
            OrderEvent::MarkDelivered => OrderEventKind::MarkDelivered,
            OrderEvent::Cancel { .. } => OrderEventKind::Cancel,
        }
    }
}

/// Payload-free name of an [`OrderEvent`], used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderEventKind {
    BeginProcessing,
    ConfirmPayment,
    MarkShipped,
    MarkDelivered,
    Cancel,
}

impl fmt::Display for OrderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderEventKind::BeginProcessing => "begin-processing",
            OrderEventKind::ConfirmPayment => "confirm-payment",
            OrderEventKind::MarkShipped => "mark-shipped",
            OrderEventKind::MarkDelivered => "mark-delivered",
            OrderEventKind::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// Side effect the caller must carry out after a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Return the order's lines to stock.
    ReleaseStock,
}

/// Whether `event` may be applied to an order in `status` with the given
/// payment flag.
pub fn is_allowed(status: OrderStatus, paid: bool, event: OrderEventKind) -> bool {
    use OrderStatus::*;
    match event {
        OrderEventKind::BeginProcessing => status == Pending,
        OrderEventKind::ConfirmPayment => matches!(status, Pending | Processing) && !paid,
        OrderEventKind::MarkShipped => status == Processing && paid,
        OrderEventKind::MarkDelivered => status == Shipped,
        OrderEventKind::Cancel => matches!(status, Pending | Processing),
    }
}

impl Order {
    /// Checks `event` against the current state without mutating anything.
    pub fn check(&self, event: OrderEventKind) -> Result<()> {
        if is_allowed(self.status, self.paid, event) {
            Ok(())
        } else {
            Err(FulfillmentError::InvalidTransition {
                from: self.status,
                event,
            })
        }
    }

    /// Applies `event` at time `now`.
    ///
    /// Returns the side effect the caller owes, e.g. releasing stock after a
    /// cancellation. On error the order is unchanged.
    pub fn apply(&mut self, event: OrderEvent, now: DateTime<Utc>) -> Result<Effect> {
        self.check(event.kind())?;

        let effect = match event {
            OrderEvent::BeginProcessing => {
                self.status = OrderStatus::Processing;
                Effect::None
            }
            OrderEvent::ConfirmPayment { receipt } => {
                self.paid = true;
                self.paid_at = Some(now);
                self.payment_receipt = receipt;
                if self.payment_method.collapses_delivery() {
                    self.status = OrderStatus::Delivered;
                    self.delivered = true;
                    self.delivered_at = Some(now);
                } else {
                    self.status = OrderStatus::Processing;
                }
                Effect::None
            }
            OrderEvent::MarkShipped { tracking } => {
                self.status = OrderStatus::Shipped;
                if let Some(tracking) = tracking {
                    self.tracking = Some(tracking);
                }
                Effect::None
            }
            OrderEvent::MarkDelivered => {
                self.status = OrderStatus::Delivered;
                self.delivered = true;
                self.delivered_at = Some(now);
                Effect::None
            }
            OrderEvent::Cancel { reason } => {
                self.status = OrderStatus::Cancelled;
                self.active = false;
                let line = match reason {
                    Some(reason) => format!("Order cancelled: {reason}"),
                    None => "Order cancelled".to_string(),
                };
                self.notes = Some(match self.notes.take() {
                    Some(existing) => format!("{existing}\n{line}"),
                    None => line,
                });
                Effect::ReleaseStock
            }
        };

        self.updated_at = now;
        Ok(effect)
    }
}
