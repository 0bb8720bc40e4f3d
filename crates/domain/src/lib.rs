//! Domain model for marketplace checkout.
//!
//! This crate holds the plain data and pure rules the checkout saga works on:
//! - Money in minor units with half-up percentage rounding
//! - Products, carts and frozen order snapshots
//! - Order and payment status machines
//! - The pricing calculator and the order number generator

pub mod cart;
pub mod error;
pub mod money;
pub mod order;
pub mod order_number;
pub mod pricing;
pub mod product;

pub use cart::{Cart, CartLine};
pub use error::DomainError;
pub use money::{Money, TaxRate};
pub use order::{Order, OrderLineItem, OrderStatus, PaymentStatus, PlaceOrderInput};
pub use order_number::{OrderNumber, OrderNumberGenerator, OrderNumberSource};
pub use pricing::{OrderTotals, PricingPolicy};
pub use product::{Product, ProductId};
