//! The checkout saga: cart in, order out.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use common::BuyerId;
use domain::{
    Cart, Order, OrderLineItem, OrderNumberGenerator, OrderNumberSource, OrderTotals,
    PlaceOrderInput,
};
use store::{CartStore, OrderStore, ProductCatalog, ReserveOutcome, StockLedger};
use tokio::time::Instant;

use crate::compensation::{CompensationSupervisor, ReservationGuard};
use crate::config::SagaConfig;
use crate::error::{Result, SagaError};

pub const SAGA_TYPE: &str = "PlaceOrder";
pub const STEP_LOAD_CART: &str = "load_cart";
pub const STEP_LOOKUP_PRODUCT: &str = "lookup_product";
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";
pub const STEP_PERSIST_ORDER: &str = "persist_order";
pub const STEP_CLEAR_CART: &str = "clear_cart";

/// Turns a buyer's cart into a persisted order.
///
/// Lines are reserved one at a time in cart order. If any step fails, every
/// reservation made so far is released before the error is returned, so a
/// caller never sees a half-placed order. Dropping a checkout future part way
/// through releases its reservations in the background.
pub struct OrderAssembler<C, L, O, K>
where
    C: ProductCatalog,
    L: StockLedger + Clone + 'static,
    O: OrderStore,
    K: CartStore,
{
    catalog: C,
    ledger: L,
    orders: O,
    carts: K,
    order_numbers: Arc<dyn OrderNumberSource>,
    config: SagaConfig,
}

impl<C, L, O, K> OrderAssembler<C, L, O, K>
where
    C: ProductCatalog,
    L: StockLedger + Clone + 'static,
    O: OrderStore,
    K: CartStore,
{
    /// Creates an assembler with default settings and the time-based number generator.
    pub fn new(catalog: C, ledger: L, orders: O, carts: K) -> Self {
        Self {
            catalog,
            ledger,
            orders,
            carts,
            order_numbers: Arc::new(OrderNumberGenerator::default()),
            config: SagaConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SagaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_order_numbers(mut self, source: Arc<dyn OrderNumberSource>) -> Self {
        self.order_numbers = source;
        self
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Loads the buyer's saved cart and places an order from it.
    #[tracing::instrument(skip(self, input), fields(saga_type = SAGA_TYPE))]
    pub async fn checkout(&self, buyer_id: BuyerId, input: PlaceOrderInput) -> Result<Order> {
        let deadline = Instant::now() + self.config.checkout_timeout;
        let cart = within(deadline, STEP_LOAD_CART, self.carts.get_cart(buyer_id)).await?;
        self.place_order_by(deadline, buyer_id, input, &cart).await
    }

    /// Places an order from `cart`, bounded by the configured checkout timeout.
    pub async fn place_order(
        &self,
        buyer_id: BuyerId,
        input: PlaceOrderInput,
        cart: &Cart,
    ) -> Result<Order> {
        let deadline = Instant::now() + self.config.checkout_timeout;
        self.place_order_by(deadline, buyer_id, input, cart).await
    }

    /// Places an order from `cart`, abandoning the in-flight step once `deadline` passes.
    ///
    /// Compensation after a missed deadline runs on its own grace budget. An
    /// order insert cut off by the deadline is looked up before anything is
    /// released, so a late commit keeps its stock.
    #[tracing::instrument(skip(self, input, cart), fields(saga_type = SAGA_TYPE, lines = cart.len()))]
    pub async fn place_order_by(
        &self,
        deadline: Instant,
        buyer_id: BuyerId,
        input: PlaceOrderInput,
        cart: &Cart,
    ) -> Result<Order> {
        if cart.is_empty() {
            return Err(SagaError::EmptyCart);
        }
        input.validate()?;

        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        let mut guard = ReservationGuard::new(self.ledger.clone(), self.config.compensation_grace);
        let result = self
            .run(deadline, buyer_id, input, cart, guard.supervisor())
            .await;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);

        match result {
            Ok(order) => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    total = %order.total,
                    duration,
                    "saga completed successfully"
                );
                Ok(order)
            }
            Err(err) => {
                let report = guard.compensate().await;
                metrics::counter!("saga_failed", "reason" => err.reason()).increment(1);
                tracing::warn!(
                    reason = %err,
                    released = report.released.len(),
                    unreleased = report.failed.len(),
                    "saga failed"
                );
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        deadline: Instant,
        buyer_id: BuyerId,
        input: PlaceOrderInput,
        cart: &Cart,
        supervisor: &mut CompensationSupervisor,
    ) -> Result<Order> {
        let mut items = Vec::with_capacity(cart.len());

        for line in cart.lines() {
            tracing::info!(
                step = STEP_RESERVE_STOCK,
                product_id = %line.product_id,
                quantity = line.quantity,
                "saga step started"
            );

            let product = within(
                deadline,
                STEP_LOOKUP_PRODUCT,
                self.catalog.get_product(&line.product_id),
            )
            .await?
            .ok_or_else(|| SagaError::ProductNotFound {
                product_id: line.product_id.clone(),
            })?;

            let outcome = within(
                deadline,
                STEP_RESERVE_STOCK,
                self.ledger.reserve(&line.product_id, line.quantity),
            )
            .await?;

            match outcome {
                ReserveOutcome::Reserved => {
                    supervisor.record(line.product_id.clone(), line.quantity);
                }
                ReserveOutcome::InsufficientStock { available } => {
                    return Err(SagaError::InsufficientStock {
                        product_id: line.product_id.clone(),
                        requested: line.quantity,
                        available,
                    });
                }
                ReserveOutcome::NotFound => {
                    return Err(SagaError::ProductNotFound {
                        product_id: line.product_id.clone(),
                    });
                }
            }

            items.push(OrderLineItem::snapshot(&product, line));
        }
        supervisor.all_reserved();

        let totals = self
            .config
            .pricing
            .quote(items.iter().map(|item| (item.unit_price, item.quantity)));
        let order = self
            .persist(deadline, buyer_id, items, totals, input, supervisor)
            .await?;
        supervisor.persisted();

        self.clear_cart(buyer_id).await;
        Ok(order)
    }

    /// Writes the order, drawing a fresh number after each number collision.
    async fn persist(
        &self,
        deadline: Instant,
        buyer_id: BuyerId,
        items: Vec<OrderLineItem>,
        totals: OrderTotals,
        input: PlaceOrderInput,
        supervisor: &mut CompensationSupervisor,
    ) -> Result<Order> {
        let attempts = self.config.order_number_attempts.max(1);
        let mut order = Order::place(
            self.order_numbers.next_number(),
            buyer_id,
            items,
            totals,
            input,
            Utc::now(),
        );

        let mut attempt = 1;
        loop {
            tracing::info!(
                step = STEP_PERSIST_ORDER,
                attempt,
                order_number = %order.order_number,
                "saga step started"
            );
            match tokio::time::timeout_at(deadline, self.orders.insert_order(&order)).await {
                Err(_) => return self.settle_abandoned_insert(order, supervisor).await,
                Ok(Ok(())) => return Ok(order),
                Ok(Err(e)) if e.is_order_number_conflict() && attempt < attempts => {
                    metrics::counter!("order_number_collisions_total").increment(1);
                    tracing::warn!(
                        attempt,
                        order_number = %order.order_number,
                        "order number already taken, retrying with a new one"
                    );
                    order.order_number = self.order_numbers.next_number();
                    attempt += 1;
                }
                Ok(Err(e)) => return Err(SagaError::PersistenceFailure(e)),
            }
        }
    }

    /// Decides the outcome of an insert abandoned at the deadline.
    ///
    /// The write may still have committed, so the order is looked up on the
    /// grace budget. A stored order is the result. A confirmed absence is a
    /// missed deadline and compensates as usual. If the lookup fails the
    /// outcome stays unknown and the reservations are kept.
    async fn settle_abandoned_insert(
        &self,
        order: Order,
        supervisor: &mut CompensationSupervisor,
    ) -> Result<Order> {
        let missed = SagaError::DeadlineExceeded {
            step: STEP_PERSIST_ORDER,
        };
        let lookup =
            tokio::time::timeout(self.config.compensation_grace, self.orders.get_order(order.id))
                .await;

        let reason = match lookup {
            Ok(Ok(Some(stored))) => {
                tracing::warn!(
                    order_id = %stored.id,
                    order_number = %stored.order_number,
                    "order write acknowledged after the checkout deadline"
                );
                return Ok(stored);
            }
            Ok(Ok(None)) => return Err(missed),
            Ok(Err(e)) => e.to_string(),
            Err(_) => "lookup timed out".to_string(),
        };

        let held = supervisor.forget();
        metrics::counter!("saga_unresolved_total").increment(1);
        tracing::error!(
            order_id = %order.id,
            order_number = %order.order_number,
            %reason,
            held = held.len(),
            "order outcome unknown after the checkout deadline, keeping reserved stock"
        );
        Err(missed)
    }

    /// Empties the buyer's cart. The order already exists, so failures are only logged.
    async fn clear_cart(&self, buyer_id: BuyerId) {
        tracing::info!(step = STEP_CLEAR_CART, "saga step started");
        let outcome =
            tokio::time::timeout(self.config.compensation_grace, self.carts.clear_cart(buyer_id))
                .await;
        let reason = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => "timed out".to_string(),
        };
        metrics::counter!("cart_clear_failures_total").increment(1);
        tracing::warn!(%buyer_id, %reason, "failed to clear cart after placing order");
    }
}

/// Runs one store call against the checkout deadline.
async fn within<T, F>(deadline: Instant, step: &'static str, call: F) -> Result<T>
where
    F: Future<Output = store::Result<T>>,
{
    match tokio::time::timeout_at(deadline, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SagaError::DeadlineExceeded { step }),
    }
}
