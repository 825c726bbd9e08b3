use super::ledger::VerifiedLine;
use crate::config::EngineConfig;
use crate::domain::ids::{OrderId, UserId, VendorId};
use crate::domain::money::{Money, TaxRate};
use crate::domain::order::{
    DeliveryMethod, Order, OrderDraft, OrderLineSnapshot, PaymentMethod, ShippingAddress,
};
use crate::error::{FulfillmentError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identifier pair of an order, fixed before payment so a retried charge
/// reuses the same id and reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIdentity {
    pub id: OrderId,
    pub reference: String,
}

impl OrderIdentity {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let id = OrderId::generate();
        let suffix: String = id
            .as_uuid()
            .simple()
            .to_string()
            .chars()
            .take(8)
            .collect::<String>()
            .to_uppercase();
        Self {
            id,
            reference: format!("ORD-{}-{}", now.format("%Y%m%d"), suffix),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

/// What the shopper asked for, independent of which vendor bucket is built.
#[derive(Debug, Clone)]
pub struct OrderSpec<'a> {
    pub user_id: &'a UserId,
    pub vendor_id: &'a VendorId,
    pub delivery_method: DeliveryMethod,
    pub shipping_address: Option<&'a ShippingAddress>,
    pub payment_method: PaymentMethod,
}

/// Builds priced, immutable orders from verified lines.
#[derive(Debug, Clone)]
pub struct OrderFactory {
    tax_rate: TaxRate,
    shipping_fee: Money,
}

impl OrderFactory {
    pub fn new(tax_rate: TaxRate, shipping_fee: Money) -> Self {
        Self {
            tax_rate,
            shipping_fee,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.tax_rate, config.shipping_fee)
    }

    /// Rejects a delivery choice that can never produce an order.
    ///
    /// Returns the address to ship to, which is `None` for pickup.
    pub fn validate_delivery<'a>(
        delivery_method: DeliveryMethod,
        shipping_address: Option<&'a ShippingAddress>,
    ) -> Result<Option<&'a ShippingAddress>> {
        match delivery_method {
            DeliveryMethod::Pickup => Ok(None),
            DeliveryMethod::Home => match shipping_address {
                Some(address) if !address.is_blank() => Ok(Some(address)),
                _ => Err(FulfillmentError::AddressRequired),
            },
        }
    }

    pub fn shipping_for(&self, delivery_method: DeliveryMethod) -> Money {
        match delivery_method {
            DeliveryMethod::Home => self.shipping_fee,
            DeliveryMethod::Pickup => Money::ZERO,
        }
    }

    pub fn price(&self, subtotal: Money, delivery_method: DeliveryMethod) -> PriceBreakdown {
        let tax = self.tax_rate.tax_on(subtotal);
        let shipping = self.shipping_for(delivery_method);
        PriceBreakdown {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
        }
    }

    /// Freezes `lines` into an order for a single vendor.
    ///
    /// Unit prices, names and images are copied from the products as they
    /// were verified; the order never reads the catalog again.
    pub fn build(
        &self,
        identity: OrderIdentity,
        spec: &OrderSpec<'_>,
        lines: &[VerifiedLine],
        now: DateTime<Utc>,
    ) -> Result<Order> {
        if lines.is_empty() {
            return Err(FulfillmentError::EmptySelection);
        }
        let shipping_address =
            Self::validate_delivery(spec.delivery_method, spec.shipping_address)?.cloned();

        let snapshots: Vec<OrderLineSnapshot> = lines
            .iter()
            .map(|line| {
                OrderLineSnapshot::new(
                    line.product.id.clone(),
                    line.product.name.clone(),
                    line.product.image.clone(),
                    line.product.unit_price,
                    line.quantity,
                )
            })
            .collect();

        let subtotal: Money = snapshots.iter().map(OrderLineSnapshot::line_total).sum();
        let price = self.price(subtotal, spec.delivery_method);

        let draft = OrderDraft {
            id: identity.id,
            reference: identity.reference,
            user_id: spec.user_id.clone(),
            vendor_id: spec.vendor_id.clone(),
            lines: snapshots,
            subtotal: price.subtotal,
            tax_rate: self.tax_rate,
            tax_amount: price.tax,
            shipping_cost: price.shipping,
            delivery_method: spec.delivery_method,
            shipping_address,
            payment_method: spec.payment_method,
        };
        Ok(Order::from_draft(draft, now))
    }
}
