//! Placed orders and their frozen line snapshots.

mod status;

use chrono::{DateTime, Utc};
use common::{BuyerId, OrderId, VendorId};
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::error::DomainError;
use crate::money::Money;
use crate::order_number::OrderNumber;
use crate::pricing::OrderTotals;
use crate::product::{Product, ProductId};

pub use status::{OrderStatus, PaymentStatus};

/// Buyer-supplied checkout details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderInput {
    pub shipping_address: String,
    pub payment_method: String,
}

impl PlaceOrderInput {
    pub fn new(shipping_address: impl Into<String>, payment_method: impl Into<String>) -> Self {
        Self {
            shipping_address: shipping_address.into(),
            payment_method: payment_method.into(),
        }
    }

    /// Both fields are required.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.shipping_address.trim().is_empty() {
            return Err(DomainError::MissingField("shipping_address"));
        }
        if self.payment_method.trim().is_empty() {
            return Err(DomainError::MissingField("payment_method"));
        }
        Ok(())
    }
}

/// One product line of a placed order, frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: ProductId,
    pub vendor_id: VendorId,
    pub name: String,
    pub image: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

impl OrderLineItem {
    /// Snapshots a cart line against the current catalog product.
    ///
    /// Price, name and vendor come from the catalog; only the image and the
    /// quantity come from the cart.
    pub fn snapshot(product: &Product, line: &CartLine) -> Self {
        let image = if line.image.is_empty() {
            product.image.clone()
        } else {
            line.image.clone()
        };
        Self {
            product_id: product.id.clone(),
            vendor_id: product.vendor_id,
            name: product.name.clone(),
            image,
            unit_price: product.price,
            quantity: line.quantity,
            subtotal: product.price.multiply(line.quantity),
        }
    }
}

/// A placed order.
///
/// Totals are computed once at checkout and never recomputed; only status,
/// payment status and tracking change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub buyer_id: BuyerId,
    pub items: Vec<OrderLineItem>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub tax: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub shipping_address: String,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Assembles a fresh `pending`/`pending` order.
    pub fn place(
        order_number: OrderNumber,
        buyer_id: BuyerId,
        items: Vec<OrderLineItem>,
        totals: OrderTotals,
        input: PlaceOrderInput,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            order_number,
            buyer_id,
            items,
            subtotal: totals.subtotal,
            shipping_fee: totals.shipping_fee,
            tax: totals.tax,
            total: totals.total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: input.payment_method,
            shipping_address: input.shipping_address,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            shipping_fee: self.shipping_fee,
            tax: self.tax,
            total: self.total,
        }
    }

    /// Returns true if any line belongs to the vendor.
    pub fn involves_vendor(&self, vendor_id: VendorId) -> bool {
        self.items.iter().any(|item| item.vendor_id == vendor_id)
    }

    /// Total units ordered for a product across all lines.
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.items
            .iter()
            .filter(|item| &item.product_id == product_id)
            .map(|item| item.quantity)
            .sum()
    }

    /// Applies a fulfillment transition, recording a tracking number when given.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        tracking_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if let Some(tracking) = tracking_number.filter(|t| !t.trim().is_empty()) {
            self.tracking_number = Some(tracking);
        }
        match next {
            OrderStatus::Paid => self.payment_status = PaymentStatus::Paid,
            OrderStatus::Refunded => self.payment_status = PaymentStatus::Refunded,
            _ => {}
        }
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PricingPolicy;

    fn product(price_units: i64) -> Product {
        Product::new("SKU-1", VendorId::new(), "Catalog Name", Money::from_units(price_units), 10)
            .with_image("catalog.png")
    }

    fn sample_order() -> Order {
        let p = product(100);
        let line = CartLine::new("SKU-1", "Cart Name", Money::from_units(80), 2);
        let item = OrderLineItem::snapshot(&p, &line);
        let totals = PricingPolicy::default().quote([(item.unit_price, item.quantity)]);
        Order::place(
            OrderNumber::new("VEN-1"),
            BuyerId::new(),
            vec![item],
            totals,
            PlaceOrderInput::new("1 Main St", "card"),
            Utc::now(),
        )
    }

    #[test]
    fn test_snapshot_uses_catalog_values() {
        let p = product(100);
        let line = CartLine::new("SKU-1", "Cart Name", Money::from_units(80), 3)
            .with_image("cart.png");
        let item = OrderLineItem::snapshot(&p, &line);

        assert_eq!(item.unit_price, Money::from_units(100));
        assert_eq!(item.name, "Catalog Name");
        assert_eq!(item.vendor_id, p.vendor_id);
        assert_eq!(item.image, "cart.png");
        assert_eq!(item.subtotal, Money::from_units(300));
    }

    #[test]
    fn test_snapshot_falls_back_to_catalog_image() {
        let p = product(1);
        let line = CartLine::new("SKU-1", "x", Money::from_units(1), 1);
        assert_eq!(OrderLineItem::snapshot(&p, &line).image, "catalog.png");
    }

    #[test]
    fn test_place_starts_pending() {
        let order = sample_order();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total, order.subtotal + order.shipping_fee + order.tax);
        assert!(order.tracking_number.is_none());
        assert_eq!(order.quantity_of(&"SKU-1".into()), 2);
    }

    #[test]
    fn test_transition_records_tracking_and_payment() {
        let mut order = sample_order();
        order
            .transition_to(OrderStatus::Paid, None, Utc::now())
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);

        order
            .transition_to(OrderStatus::Confirmed, None, Utc::now())
            .unwrap();
        order
            .transition_to(OrderStatus::Shipped, Some("TRK-9".into()), Utc::now())
            .unwrap();
        assert_eq!(order.tracking_number.as_deref(), Some("TRK-9"));
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut order = sample_order();
        let err = order
            .transition_to(OrderStatus::Delivered, None, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered,
            }
        );
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_input_validation() {
        assert!(PlaceOrderInput::new("addr", "card").validate().is_ok());
        assert_eq!(
            PlaceOrderInput::new(" ", "card").validate(),
            Err(DomainError::MissingField("shipping_address"))
        );
        assert_eq!(
            PlaceOrderInput::new("addr", "").validate(),
            Err(DomainError::MissingField("payment_method"))
        );
    }

    #[test]
    fn test_order_serialization_roundtrip() {
        let order = sample_order();
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }
}
