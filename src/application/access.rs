use crate::domain::ids::{UserId, VendorId};
use crate::domain::order::Order;
use crate::domain::state_machine::OrderEventKind;
use crate::error::{FulfillmentError, Result};
use std::fmt;
use std::str::FromStr;

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Actor {
    Customer(UserId),
    Vendor(VendorId),
    Admin,
}

impl Actor {
    fn owns(&self, order: &Order) -> bool {
        matches!(self, Actor::Customer(user_id) if user_id == order.user_id())
    }

    fn sells(&self, order: &Order) -> bool {
        matches!(self, Actor::Vendor(vendor_id) if vendor_id == order.vendor_id())
    }

    fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin)
    }

    pub fn can_view(&self, order: &Order) -> bool {
        self.is_admin() || self.owns(order) || self.sells(order)
    }

    pub fn can_apply(&self, order: &Order, event: OrderEventKind) -> bool {
        match event {
            OrderEventKind::ConfirmPayment | OrderEventKind::Cancel => self.can_view(order),
            OrderEventKind::BeginProcessing
            | OrderEventKind::MarkShipped
            | OrderEventKind::MarkDelivered => self.is_admin() || self.sells(order),
        }
    }

    pub fn authorize_view(&self, order: &Order) -> Result<()> {
        if self.can_view(order) {
            Ok(())
        } else {
            Err(FulfillmentError::Unauthorized {
                action: "view this order",
            })
        }
    }

    pub fn authorize_event(&self, order: &Order, event: OrderEventKind) -> Result<()> {
        if self.can_apply(order, event) {
            Ok(())
        } else {
            Err(FulfillmentError::Unauthorized {
                action: "update this order",
            })
        }
    }

    pub fn authorize_user(&self, user_id: &UserId) -> Result<()> {
        match self {
            Actor::Customer(id) if id == user_id => Ok(()),
            Actor::Admin => Ok(()),
            _ => Err(FulfillmentError::Unauthorized {
                action: "act for this customer",
            }),
        }
    }

    pub fn authorize_vendor(&self, vendor_id: &VendorId) -> Result<()> {
        match self {
            Actor::Vendor(id) if id == vendor_id => Ok(()),
            Actor::Admin => Ok(()),
            _ => Err(FulfillmentError::Unauthorized {
                action: "list this vendor's orders",
            }),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Customer(user_id) => write!(f, "customer:{user_id}"),
            Actor::Vendor(vendor_id) => write!(f, "vendor:{vendor_id}"),
            Actor::Admin => f.write_str("admin"),
        }
    }
}

impl FromStr for Actor {
    type Err = FulfillmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once(':') {
            Some(("customer", id)) if !id.is_empty() => Ok(Actor::Customer(UserId::from(id))),
            Some(("vendor", id)) if !id.is_empty() => Ok(Actor::Vendor(VendorId::from(id))),
            None if s.trim() == "admin" => Ok(Actor::Admin),
            _ => Err(FulfillmentError::ValidationError(format!(
                "unrecognized actor: {s}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PaymentMethod;
    use crate::domain::order::fixtures::order_with;

    #[test]
    fn test_parse_actor() {
        assert_eq!(
            "customer:u1".parse::<Actor>().unwrap(),
            Actor::Customer(UserId::from("u1"))
        );
        assert_eq!(
            "vendor:v1".parse::<Actor>().unwrap(),
            Actor::Vendor(VendorId::from("v1"))
        );
        assert_eq!("admin".parse::<Actor>().unwrap(), Actor::Admin);
        assert!("root".parse::<Actor>().is_err());
        assert!("customer:".parse::<Actor>().is_err());
    }

    #[test]
    fn test_order_permissions() {
        let order = order_with(PaymentMethod::Card);
        let owner = Actor::Customer(UserId::from("u1"));
        let stranger = Actor::Customer(UserId::from("u2"));
        let seller = Actor::Vendor(VendorId::from("v1"));
        let other_seller = Actor::Vendor(VendorId::from("v2"));

        assert!(owner.can_view(&order));
        assert!(!stranger.can_view(&order));
        assert!(!other_seller.can_view(&order));

        assert!(owner.can_apply(&order, OrderEventKind::Cancel));
        assert!(!owner.can_apply(&order, OrderEventKind::MarkShipped));
        assert!(seller.can_apply(&order, OrderEventKind::MarkShipped));
        assert!(Actor::Admin.can_apply(&order, OrderEventKind::MarkDelivered));

        assert!(matches!(
            stranger.authorize_event(&order, OrderEventKind::Cancel),
            Err(FulfillmentError::Unauthorized { .. })
        ));
    }
}
