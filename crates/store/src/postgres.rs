use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BuyerId, OrderId, VendorId};
use domain::{
    Cart, CartLine, Money, Order, OrderLineItem, OrderNumber, OrderStatus, PaymentStatus,
    Product, ProductId,
};
use sqlx::types::Json;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{CartStore, OrderStore, ProductCatalog, ReleaseOutcome, ReserveOutcome, StockLedger},
};

const ORDER_COLUMNS: &str = "id, order_number, buyer_id, items, subtotal_cents, shipping_fee_cents, \
     tax_cents, total_cents, status, payment_status, payment_method, shipping_address, \
     tracking_number, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            vendor_id: VendorId::from_uuid(row.try_get::<Uuid, _>("vendor_id")?),
            name: row.try_get("name")?,
            image: row.try_get("image")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: to_u32(row.try_get("stock")?, "products.stock")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let payment_status: String = row.try_get("payment_status")?;
        let Json(items): Json<Vec<OrderLineItem>> = row.try_get("items")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_number: OrderNumber::new(row.try_get::<String, _>("order_number")?),
            buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            items,
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            shipping_fee: Money::from_cents(row.try_get("shipping_fee_cents")?),
            tax: Money::from_cents(row.try_get("tax_cents")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            status: status.parse::<OrderStatus>().map_err(StoreError::CorruptRow)?,
            payment_status: payment_status
                .parse::<PaymentStatus>()
                .map_err(StoreError::CorruptRow)?,
            payment_method: row.try_get("payment_method")?,
            shipping_address: row.try_get("shipping_address")?,
            tracking_number: row.try_get("tracking_number")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn fetch_orders(&self, sql: &str, bind: OrderFilter) -> Result<Vec<Order>> {
        let query = sqlx::query(sql);
        let query = match bind {
            OrderFilter::Buyer(id) => query.bind(id),
            OrderFilter::Vendor(filter) => query.bind(filter),
        };
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }
}

enum OrderFilter {
    Buyer(Uuid),
    Vendor(serde_json::Value),
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::CorruptRow(format!("{column} = {value}")))
}

fn map_unique_violation(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
        && let Some(constraint) = db_err.constraint()
    {
        return StoreError::Conflict {
            constraint: constraint.to_string(),
        };
    }
    StoreError::Database(e)
}

#[async_trait]
impl StockLedger for PostgresStore {
    #[tracing::instrument(skip(self))]
    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<ReserveOutcome> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = now()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        if remaining.is_some() {
            return Ok(ReserveOutcome::Reserved);
        }

        // Nothing matched: tell a missing product apart from a short one.
        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        tracing::debug!(?available, "conditional reserve matched no row");
        match available {
            None => Ok(ReserveOutcome::NotFound),
            Some(stock) => Ok(ReserveOutcome::InsufficientStock {
                available: to_u32(stock, "products.stock")?,
            }),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<ReleaseOutcome> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $2, updated_at = now() WHERE id = $1",
        )
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(ReleaseOutcome::NotFound)
        } else {
            Ok(ReleaseOutcome::Released)
        }
    }
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, vendor_id, name, image, price_cents, stock, updated_at FROM products WHERE id = $1",
        )
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, vendor_id, name, image, price_cents, stock, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                vendor_id = EXCLUDED.vendor_id,
                name = EXCLUDED.name,
                image = EXCLUDED.image,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id.as_str())
        .bind(product.vendor_id.as_uuid())
        .bind(&product.name)
        .bind(&product.image)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_cart(&self, buyer_id: BuyerId) -> Result<Cart> {
        let row = sqlx::query("SELECT items, created_at, updated_at FROM carts WHERE buyer_id = $1")
            .bind(buyer_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(Cart::empty(buyer_id));
        };
        let Json(lines): Json<Vec<CartLine>> = row.try_get("items")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
        Ok(Cart::from_parts(buyer_id, lines, created_at, updated_at))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (buyer_id, items, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (buyer_id) DO UPDATE SET
                items = EXCLUDED.items,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cart.buyer_id.as_uuid())
        .bind(Json(cart.lines()))
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_cart(&self, buyer_id: BuyerId) -> Result<()> {
        sqlx::query("UPDATE carts SET items = '[]'::jsonb, updated_at = now() WHERE buyer_id = $1")
            .bind(buyer_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(order_number = %order.order_number))]
    async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, buyer_id, items, subtotal_cents, shipping_fee_cents,
                                tax_cents, total_cents, status, payment_status, payment_method,
                                shipping_address, tracking_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.order_number.as_str())
        .bind(order.buyer_id.as_uuid())
        .bind(Json(&order.items))
        .bind(order.subtotal.cents())
        .bind(order.shipping_fee.cents())
        .bind(order.tax.cents())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.payment_method)
        .bind(&order.shipping_address)
        .bind(&order.tracking_number)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>> {
        self.fetch_orders(
            &format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC"
            ),
            OrderFilter::Buyer(buyer_id.as_uuid()),
        )
        .await
    }

    async fn list_orders_for_vendor(&self, vendor_id: VendorId) -> Result<Vec<Order>> {
        // JSONB containment: any line whose vendor_id matches.
        let filter = serde_json::json!([{ "vendor_id": vendor_id }]);
        self.fetch_orders(
            &format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE items @> $1 ORDER BY created_at DESC"
            ),
            OrderFilter::Vendor(filter),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        tracking_number: Option<String>,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

        let mut order = Self::row_to_order(row)?;
        order.transition_to(status, tracking_number, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_status = $3, tracking_number = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.tracking_number)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(order)
    }
}
