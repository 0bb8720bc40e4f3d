//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{BuyerId, OrderId, VendorId};
use domain::{
    Cart, CartLine, Money, Order, OrderLineItem, OrderNumber, OrderStatus, PaymentStatus,
    PlaceOrderInput, PricingPolicy, Product, ProductId,
};
use sqlx::PgPool;
use store::{
    CartStore, OrderStore, PostgresStore, ProductCatalog, ReleaseOutcome, ReserveOutcome,
    StockLedger, StoreError,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE products, carts, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn product(id: &str, vendor_id: VendorId, stock: u32) -> Product {
    Product::new(id, vendor_id, format!("Product {id}"), Money::from_units(40), stock)
        .with_image(format!("{id}.png"))
}

fn order_for(buyer_id: BuyerId, products: &[&Product], number: &str) -> Order {
    let items: Vec<OrderLineItem> = products
        .iter()
        .map(|p| OrderLineItem::snapshot(p, &CartLine::new(p.id.clone(), "x", p.price, 2)))
        .collect();
    let totals = PricingPolicy::default().quote(items.iter().map(|i| (i.unit_price, i.quantity)));
    Order::place(
        OrderNumber::new(number),
        buyer_id,
        items,
        totals,
        PlaceOrderInput::new("1 Main St", "card"),
        Utc::now(),
    )
}

#[tokio::test]
async fn test_product_upsert_and_get() {
    let store = get_test_store().await;
    let vendor = VendorId::new();
    let p = product("SKU-1", vendor, 7);

    store.upsert_product(p.clone()).await.unwrap();
    let loaded = store.get_product(&p.id).await.unwrap().unwrap();
    assert_eq!(loaded.vendor_id, vendor);
    assert_eq!(loaded.price, Money::from_units(40));
    assert_eq!(loaded.stock, 7);
    assert_eq!(loaded.image, "SKU-1.png");

    assert!(store.get_product(&"NOPE".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_conditional_reserve() {
    let store = get_test_store().await;
    store
        .upsert_product(product("SKU-1", VendorId::new(), 5))
        .await
        .unwrap();
    let id = ProductId::new("SKU-1");

    assert_eq!(store.reserve(&id, 4).await.unwrap(), ReserveOutcome::Reserved);
    assert_eq!(
        store.reserve(&id, 2).await.unwrap(),
        ReserveOutcome::InsufficientStock { available: 1 }
    );
    assert_eq!(
        store.reserve(&"GHOST".into(), 1).await.unwrap(),
        ReserveOutcome::NotFound
    );

    assert_eq!(store.release(&id, 4).await.unwrap(), ReleaseOutcome::Released);
    assert_eq!(
        store.release(&"GHOST".into(), 1).await.unwrap(),
        ReleaseOutcome::NotFound
    );
    assert_eq!(store.get_product(&id).await.unwrap().unwrap().stock, 5);
}

#[tokio::test]
async fn test_concurrent_reserves_never_oversell() {
    let store = get_test_store().await;
    store
        .upsert_product(product("HOT", VendorId::new(), 10))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..30 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.reserve(&"HOT".into(), 1).await.unwrap()
        }));
    }

    let mut reserved = 0;
    for handle in handles {
        if handle.await.unwrap() == ReserveOutcome::Reserved {
            reserved += 1;
        }
    }

    assert_eq!(reserved, 10);
    assert_eq!(store.get_product(&"HOT".into()).await.unwrap().unwrap().stock, 0);
}

#[tokio::test]
async fn test_cart_persistence() {
    let store = get_test_store().await;
    let buyer = BuyerId::new();

    assert!(store.get_cart(buyer).await.unwrap().is_empty());

    let mut cart = Cart::empty(buyer);
    cart.add_line(CartLine::new("A", "Alpha", Money::from_units(3), 1))
        .unwrap();
    cart.add_line(CartLine::new("B", "Beta", Money::from_units(4), 2))
        .unwrap();
    store.save_cart(&cart).await.unwrap();

    let loaded = store.get_cart(buyer).await.unwrap();
    assert_eq!(loaded.lines(), cart.lines());

    store.clear_cart(buyer).await.unwrap();
    assert!(store.get_cart(buyer).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_order_insert_and_duplicate_number() {
    let store = get_test_store().await;
    let buyer = BuyerId::new();
    let p = product("SKU-1", VendorId::new(), 1);

    let order = order_for(buyer, &[&p], "VEN-12345678");
    store.insert_order(&order).await.unwrap();

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.order_number, order.order_number);
    assert_eq!(loaded.items, order.items);
    assert_eq!(loaded.total, order.total);
    assert_eq!(loaded.status, OrderStatus::Pending);
    assert_eq!(loaded.payment_status, PaymentStatus::Pending);

    let duplicate = order_for(buyer, &[&p], "VEN-12345678");
    let err = store.insert_order(&duplicate).await.unwrap_err();
    assert!(err.is_order_number_conflict(), "unexpected error: {err}");

    assert!(store.get_order(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_order_listing() {
    let store = get_test_store().await;
    let buyer = BuyerId::new();
    let vendor_a = VendorId::new();
    let vendor_b = VendorId::new();
    let a = product("A", vendor_a, 1);
    let b = product("B", vendor_b, 1);

    store
        .insert_order(&order_for(buyer, &[&a], "VEN-1"))
        .await
        .unwrap();
    store
        .insert_order(&order_for(buyer, &[&a, &b], "VEN-2"))
        .await
        .unwrap();
    store
        .insert_order(&order_for(BuyerId::new(), &[&b], "VEN-3"))
        .await
        .unwrap();

    assert_eq!(store.list_orders_for_buyer(buyer).await.unwrap().len(), 2);
    assert_eq!(store.list_orders_for_vendor(vendor_a).await.unwrap().len(), 2);
    assert_eq!(store.list_orders_for_vendor(vendor_b).await.unwrap().len(), 2);
    assert!(
        store
            .list_orders_for_vendor(VendorId::new())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_order_status_update() {
    let store = get_test_store().await;
    let p = product("SKU-1", VendorId::new(), 1);
    let order = order_for(BuyerId::new(), &[&p], "VEN-9");
    store.insert_order(&order).await.unwrap();

    let paid = store
        .update_order_status(order.id, OrderStatus::Paid, None)
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);

    store
        .update_order_status(order.id, OrderStatus::Confirmed, None)
        .await
        .unwrap();
    let shipped = store
        .update_order_status(order.id, OrderStatus::Shipped, Some("TRK-1".into()))
        .await
        .unwrap();
    assert_eq!(shipped.tracking_number.as_deref(), Some("TRK-1"));

    let reloaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, OrderStatus::Shipped);
    assert_eq!(reloaded.tracking_number.as_deref(), Some("TRK-1"));

    let err = store
        .update_order_status(order.id, OrderStatus::Pending, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Domain(_)));
}
