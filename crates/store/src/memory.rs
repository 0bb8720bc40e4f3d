use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{BuyerId, OrderId, VendorId};
use domain::{Cart, Order, OrderStatus, Product, ProductId};
use tokio::sync::RwLock;

use crate::{
    ORDER_NUMBER_CONSTRAINT, Result, StoreError,
    store::{CartStore, OrderStore, ProductCatalog, ReleaseOutcome, ReserveOutcome, StockLedger},
};

#[derive(Default)]
struct State {
    products: HashMap<ProductId, Product>,
    carts: HashMap<BuyerId, Cart>,
    orders: Vec<Order>,
}

/// Switches for simulating backend trouble in tests.
#[derive(Default)]
struct Faults {
    failing_inserts: AtomicU32,
    fail_releases: AtomicBool,
    fail_cart_clear: AtomicBool,
    reserve_delay_ms: AtomicU64,
}

/// In-memory store implementation for tests and local runs.
///
/// All state sits behind one async lock; a reservation checks and decrements
/// stock while holding the write guard, which makes it atomic with respect to
/// every other reservation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    faults: Arc<Faults>,
    writes: Arc<AtomicU64>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with products.
    pub async fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for product in products {
                state.products.insert(product.id.clone(), product);
            }
        }
        store
    }

    /// Current stock of a product, if it exists.
    pub async fn stock_of(&self, product_id: &ProductId) -> Option<u32> {
        self.state
            .read()
            .await
            .products
            .get(product_id)
            .map(|p| p.stock)
    }

    /// Overwrites a product's catalog price.
    pub async fn set_price(&self, product_id: &ProductId, price: domain::Money) -> Result<()> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;
        product.price = price;
        product.updated_at = Utc::now();
        Ok(())
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Number of mutating operations that reached the store.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes the next `count` order inserts fail as unavailable.
    pub fn fail_next_inserts(&self, count: u32) {
        self.faults.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Makes every release fail while set.
    pub fn set_fail_on_release(&self, fail: bool) {
        self.faults.fail_releases.store(fail, Ordering::SeqCst);
    }

    /// Makes every cart clear fail while set.
    pub fn set_fail_on_cart_clear(&self, fail: bool) {
        self.faults.fail_cart_clear.store(fail, Ordering::SeqCst);
    }

    /// Delays every reservation by `delay` before it touches stock.
    pub fn set_reserve_delay(&self, delay: Duration) {
        self.faults
            .reserve_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn take_insert_failure(&self) -> bool {
        self.faults
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

#[async_trait]
impl StockLedger for InMemoryStore {
    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<ReserveOutcome> {
        let delay = self.faults.reserve_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let mut state = self.state.write().await;
        let Some(product) = state.products.get_mut(product_id) else {
            return Ok(ReserveOutcome::NotFound);
        };
        if product.stock < quantity {
            return Ok(ReserveOutcome::InsufficientStock {
                available: product.stock,
            });
        }
        product.stock -= quantity;
        product.updated_at = Utc::now();
        self.record_write();
        Ok(ReserveOutcome::Reserved)
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<ReleaseOutcome> {
        if self.faults.fail_releases.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "release of {quantity} x {product_id} refused"
            )));
        }

        let mut state = self.state.write().await;
        let Some(product) = state.products.get_mut(product_id) else {
            return Ok(ReleaseOutcome::NotFound);
        };
        product.stock = product.stock.saturating_add(quantity);
        product.updated_at = Utc::now();
        self.record_write();
        Ok(ReleaseOutcome::Released)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(product_id).cloned())
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        self.state
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_cart(&self, buyer_id: BuyerId) -> Result<Cart> {
        Ok(self
            .state
            .read()
            .await
            .carts
            .get(&buyer_id)
            .cloned()
            .unwrap_or_else(|| Cart::empty(buyer_id)))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.state
            .write()
            .await
            .carts
            .insert(cart.buyer_id, cart.clone());
        self.record_write();
        Ok(())
    }

    async fn clear_cart(&self, buyer_id: BuyerId) -> Result<()> {
        if self.faults.fail_cart_clear.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "clearing cart of {buyer_id} refused"
            )));
        }

        let mut state = self.state.write().await;
        if let Some(cart) = state.carts.get_mut(&buyer_id) {
            cart.clear();
        }
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        if self.take_insert_failure() {
            return Err(StoreError::Unavailable(format!(
                "insert of order {} refused",
                order.order_number
            )));
        }

        let mut state = self.state.write().await;
        if state
            .orders
            .iter()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::Conflict {
                constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
            });
        }
        state.orders.push(order.clone());
        self.record_write();
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn list_orders_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .orders
                .iter()
                .filter(|o| o.buyer_id == buyer_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_orders_for_vendor(&self, vendor_id: VendorId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .orders
                .iter()
                .filter(|o| o.involves_vendor(vendor_id))
                .cloned()
                .collect(),
        ))
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        tracking_number: Option<String>,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        order.transition_to(status, tracking_number, Utc::now())?;
        self.record_write();
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use domain::{
        CartLine, Money, OrderLineItem, OrderNumber, PlaceOrderInput, PricingPolicy,
    };

    fn product(id: &str, stock: u32) -> Product {
        Product::new(id, VendorId::new(), "Widget", Money::from_units(10), stock)
    }

    fn order_for(buyer_id: BuyerId, product: &Product, number: &str) -> Order {
        let line = CartLine::new(product.id.clone(), "Widget", product.price, 1);
        let item = OrderLineItem::snapshot(product, &line);
        let totals = PricingPolicy::default().quote([(item.unit_price, item.quantity)]);
        Order::place(
            OrderNumber::new(number),
            buyer_id,
            vec![item],
            totals,
            PlaceOrderInput::new("addr", "card"),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let store = InMemoryStore::with_products([product("SKU-1", 5)]).await;
        let id = ProductId::new("SKU-1");

        assert_eq!(store.reserve(&id, 3).await.unwrap(), ReserveOutcome::Reserved);
        assert_eq!(store.stock_of(&id).await, Some(2));

        assert_eq!(
            store.reserve(&id, 3).await.unwrap(),
            ReserveOutcome::InsufficientStock { available: 2 }
        );
        assert_eq!(store.stock_of(&id).await, Some(2));

        assert_eq!(store.release(&id, 3).await.unwrap(), ReleaseOutcome::Released);
        assert_eq!(store.stock_of(&id).await, Some(5));
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let store = InMemoryStore::new();
        let id = ProductId::new("GHOST");
        assert_eq!(store.reserve(&id, 1).await.unwrap(), ReserveOutcome::NotFound);
        assert_eq!(store.release(&id, 1).await.unwrap(), ReleaseOutcome::NotFound);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_release_fault() {
        let store = InMemoryStore::with_products([product("SKU-1", 5)]).await;
        store.set_fail_on_release(true);
        let err = store.release(&"SKU-1".into(), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_oversell() {
        let store = InMemoryStore::with_products([product("SKU-1", 10)]).await;
        let mut handles = Vec::new();
        for _ in 0..25 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.reserve(&"SKU-1".into(), 1).await.unwrap()
            }));
        }

        let mut reserved = 0;
        for handle in handles {
            if handle.await.unwrap() == ReserveOutcome::Reserved {
                reserved += 1;
            }
        }
        assert_eq!(reserved, 10);
        assert_eq!(store.stock_of(&"SKU-1".into()).await, Some(0));
    }

    #[tokio::test]
    async fn test_cart_roundtrip_and_clear() {
        let store = InMemoryStore::new();
        let buyer = BuyerId::new();
        assert!(store.get_cart(buyer).await.unwrap().is_empty());

        let mut cart = Cart::empty(buyer);
        cart.add_line(CartLine::new("SKU-1", "Widget", Money::from_units(1), 2))
            .unwrap();
        store.save_cart(&cart).await.unwrap();
        assert_eq!(store.get_cart(buyer).await.unwrap().len(), 1);

        store.clear_cart(buyer).await.unwrap();
        assert!(store.get_cart(buyer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_order_number_conflicts() {
        let store = InMemoryStore::new();
        let p = product("SKU-1", 1);
        store
            .insert_order(&order_for(BuyerId::new(), &p, "VEN-1"))
            .await
            .unwrap();

        let err = store
            .insert_order(&order_for(BuyerId::new(), &p, "VEN-1"))
            .await
            .unwrap_err();
        assert!(err.is_order_number_conflict());
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_insert_faults_are_consumed() {
        let store = InMemoryStore::new();
        let p = product("SKU-1", 1);
        store.fail_next_inserts(1);

        assert!(
            store
                .insert_order(&order_for(BuyerId::new(), &p, "VEN-1"))
                .await
                .is_err()
        );
        assert!(
            store
                .insert_order(&order_for(BuyerId::new(), &p, "VEN-1"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_listing_by_buyer_and_vendor() {
        let store = InMemoryStore::new();
        let buyer = BuyerId::new();
        let p = product("SKU-1", 1);

        let mut older = order_for(buyer, &p, "VEN-1");
        older.created_at = Utc::now() - ChronoDuration::hours(1);
        let newer = order_for(buyer, &p, "VEN-2");
        store.insert_order(&older).await.unwrap();
        store.insert_order(&newer).await.unwrap();
        store
            .insert_order(&order_for(BuyerId::new(), &product("SKU-2", 1), "VEN-3"))
            .await
            .unwrap();

        let mine = store.list_orders_for_buyer(buyer).await.unwrap();
        let numbers: Vec<_> = mine.iter().map(|o| o.order_number.as_str()).collect();
        assert_eq!(numbers, ["VEN-2", "VEN-1"]);

        let vendor_orders = store.list_orders_for_vendor(p.vendor_id).await.unwrap();
        assert_eq!(vendor_orders.len(), 2);
    }

    #[tokio::test]
    async fn test_update_order_status() {
        let store = InMemoryStore::new();
        let order = order_for(BuyerId::new(), &product("SKU-1", 1), "VEN-1");
        store.insert_order(&order).await.unwrap();

        let updated = store
            .update_order_status(order.id, OrderStatus::Confirmed, None)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);

        let err = store
            .update_order_status(order.id, OrderStatus::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(_)));

        let err = store
            .update_order_status(OrderId::new(), OrderStatus::Paid, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
