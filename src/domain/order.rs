use super::ids::{OrderId, ProductId, UserId, VendorId};
use super::money::{Money, TaxRate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Pickup,
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Card,
    #[serde(rename = "paypal")]
    PayPal,
    BankTransfer,
    CashOnDelivery,
}

impl PaymentMethod {
    /// Whether the gateway moves money during checkout. Deferred methods are
    /// confirmed later, when the transfer lands or the courier collects cash.
    pub fn settles_at_checkout(&self) -> bool {
        matches!(self, PaymentMethod::Card | PaymentMethod::PayPal)
    }

    /// Collecting the money and handing over the goods happen in one step.
    pub fn collapses_delivery(&self) -> bool {
        matches!(self, PaymentMethod::CashOnDelivery)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::Card => "card",
            PaymentMethod::PayPal => "paypal",
            PaymentMethod::BankTransfer => "bank-transfer",
            PaymentMethod::CashOnDelivery => "cash-on-delivery",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub street: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    pub notes: Option<String>,
}

impl ShippingAddress {
    /// An address with only a street line, the minimum a courier needs.
    pub fn street_only(street: impl Into<String>) -> Self {
        Self {
            street: street.into(),
            ..Self::default()
        }
    }

    pub fn is_blank(&self) -> bool {
        self.street.trim().is_empty()
    }
}

/// Evidence that the gateway accepted a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub transaction_id: Option<String>,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
}

/// One purchased product, frozen when the order was placed.
///
/// Never recomputed from the live catalog, so later price or name changes do
/// not leak into historical orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineSnapshot {
    product_id: ProductId,
    name: String,
    image: String,
    unit_price: Money,
    quantity: u32,
}

impl OrderLineSnapshot {
    pub fn new(
        product_id: ProductId,
        name: String,
        image: String,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            name,
            image,
            unit_price,
            quantity,
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Priced contents of a new order, computed by the order factory.
#[derive(Debug, Clone)]
pub(crate) struct OrderDraft {
    pub id: OrderId,
    pub reference: String,
    pub user_id: UserId,
    pub vendor_id: VendorId,
    pub lines: Vec<OrderLineSnapshot>,
    pub subtotal: Money,
    pub tax_rate: TaxRate,
    pub tax_amount: Money,
    pub shipping_cost: Money,
    pub delivery_method: DeliveryMethod,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: PaymentMethod,
}

/// A single-vendor order aggregate.
///
/// Line snapshots and prices are fixed at creation. Only the lifecycle fields
/// (status, payment, delivery, tracking, notes) change, and only through
/// [`Order::apply`](crate::domain::state_machine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub(super) id: OrderId,
    pub(super) reference: String,
    pub(super) user_id: UserId,
    pub(super) vendor_id: VendorId,
    pub(super) lines: Vec<OrderLineSnapshot>,
    pub(super) subtotal: Money,
    pub(super) tax_rate: TaxRate,
    pub(super) tax_amount: Money,
    pub(super) shipping_cost: Money,
    pub(super) total: Money,
    pub(super) delivery_method: DeliveryMethod,
    pub(super) shipping_address: Option<ShippingAddress>,
    pub(super) payment_method: PaymentMethod,
    pub(super) status: OrderStatus,
    pub(super) paid: bool,
    pub(super) paid_at: Option<DateTime<Utc>>,
    pub(super) payment_receipt: Option<PaymentReceipt>,
    pub(super) delivered: bool,
    pub(super) delivered_at: Option<DateTime<Utc>>,
    pub(super) tracking: Option<TrackingInfo>,
    pub(super) notes: Option<String>,
    pub(super) active: bool,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

impl Order {
    pub(crate) fn from_draft(draft: OrderDraft, now: DateTime<Utc>) -> Self {
        let total = draft.subtotal + draft.tax_amount + draft.shipping_cost;
        Self {
            id: draft.id,
            reference: draft.reference,
            user_id: draft.user_id,
            vendor_id: draft.vendor_id,
            lines: draft.lines,
            subtotal: draft.subtotal,
            tax_rate: draft.tax_rate,
            tax_amount: draft.tax_amount,
            shipping_cost: draft.shipping_cost,
            total,
            delivery_method: draft.delivery_method,
            shipping_address: draft.shipping_address,
            payment_method: draft.payment_method,
            status: OrderStatus::Pending,
            paid: false,
            paid_at: None,
            payment_receipt: None,
            delivered: false,
            delivered_at: None,
            tracking: None,
            notes: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn vendor_id(&self) -> &VendorId {
        &self.vendor_id
    }

    pub fn lines(&self) -> &[OrderLineSnapshot] {
        &self.lines
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn delivery_method(&self) -> DeliveryMethod {
        self.delivery_method
    }

    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_paid(&self) -> bool {
        self.paid
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn payment_receipt(&self) -> Option<&PaymentReceipt> {
        self.payment_receipt.as_ref()
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn tracking(&self) -> Option<&TrackingInfo> {
        self.tracking.as_ref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Cancelled orders are kept for history but no longer active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn order_with(payment_method: PaymentMethod) -> Order {
        let line = OrderLineSnapshot::new(
            ProductId::from("p1"),
            "Lamp".to_string(),
            "lamp.png".to_string(),
            Money::new(dec!(100)).unwrap(),
            2,
        );
        let draft = OrderDraft {
            id: OrderId::generate(),
            reference: "ORD-20260101-ABCDEF12".to_string(),
            user_id: UserId::from("u1"),
            vendor_id: VendorId::from("v1"),
            lines: vec![line],
            subtotal: Money::new(dec!(200)).unwrap(),
            tax_rate: TaxRate::NONE,
            tax_amount: Money::ZERO,
            shipping_cost: Money::ZERO,
            delivery_method: DeliveryMethod::Pickup,
            shipping_address: None,
            payment_method,
        };
        Order::from_draft(draft, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_order_is_pending_and_unpaid() {
        let order = fixtures::order_with(PaymentMethod::Card);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(!order.is_paid());
        assert!(order.paid_at().is_none());
        assert!(order.is_active());
        assert_eq!(order.total(), Money::new(dec!(200)).unwrap());
    }

    #[test]
    fn test_payment_method_wire_names() {
        let json = serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(json, "\"cash-on-delivery\"");
        let method: PaymentMethod = serde_json::from_str("\"paypal\"").unwrap();
        assert_eq!(method, PaymentMethod::PayPal);
        assert_eq!(PaymentMethod::BankTransfer.to_string(), "bank-transfer");
    }

    #[test]
    fn test_settlement_policy() {
        assert!(PaymentMethod::Card.settles_at_checkout());
        assert!(!PaymentMethod::CashOnDelivery.settles_at_checkout());
        assert!(!PaymentMethod::BankTransfer.settles_at_checkout());
        assert!(PaymentMethod::CashOnDelivery.collapses_delivery());
    }

    #[test]
    fn test_blank_address() {
        assert!(ShippingAddress::street_only("   ").is_blank());
        assert!(!ShippingAddress::street_only("Main St 1").is_blank());
    }
}
