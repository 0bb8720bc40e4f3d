use async_trait::async_trait;
use common::{BuyerId, OrderId, VendorId};
use domain::{Cart, Order, OrderStatus, Product, ProductId};

use crate::Result;

/// Outcome of a conditional stock reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock was decremented by the requested quantity.
    Reserved,
    /// Stock was left untouched because fewer than the requested units remained.
    InsufficientStock { available: u32 },
    /// No such product.
    NotFound,
}

/// Outcome of returning previously reserved stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    NotFound,
}

/// Per-product available stock, shared by every concurrent checkout.
///
/// Stock only changes through these two primitives. Callers never read a
/// counter and write it back.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Decrements stock by `quantity` only if at least `quantity` units remain.
    ///
    /// The check and the decrement are one indivisible operation, so two
    /// concurrent reservations can never both take the last units.
    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<ReserveOutcome>;

    /// Adds `quantity` units back. Used to compensate an aborted checkout.
    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<ReleaseOutcome>;
}

/// Read access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>>;

    /// Inserts or replaces a product. Used for seeding and vendor tooling.
    async fn upsert_product(&self, product: Product) -> Result<()>;
}

/// Buyer carts.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the buyer's cart, or an empty one if none was ever saved.
    async fn get_cart(&self, buyer_id: BuyerId) -> Result<Cart>;

    async fn save_cart(&self, cart: &Cart) -> Result<()>;

    /// Empties the cart without deleting it.
    async fn clear_cart(&self, buyer_id: BuyerId) -> Result<()>;
}

/// Placed orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes a new order in a single operation.
    ///
    /// A duplicate order number fails with
    /// [`StoreError::Conflict`](crate::StoreError::Conflict) on
    /// [`ORDER_NUMBER_CONSTRAINT`](crate::ORDER_NUMBER_CONSTRAINT).
    async fn insert_order(&self, order: &Order) -> Result<()>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Orders placed by a buyer, newest first.
    async fn list_orders_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>>;

    /// Orders containing at least one line sold by the vendor, newest first.
    async fn list_orders_for_vendor(&self, vendor_id: VendorId) -> Result<Vec<Order>>;

    /// Applies a fulfillment transition and returns the updated order.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        tracking_number: Option<String>,
    ) -> Result<Order>;
}
