//! Checkout and buyer order history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use common::OrderId;
use domain::{Order, PlaceOrderInput};
use serde::{Deserialize, Serialize};
use store::OrderStore;

use crate::error::ApiError;
use crate::identity;
use crate::{AppState, MarketplaceStore};

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub shipping_address: String,
    pub payment_method: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub buyer_id: String,
    pub items: Vec<OrderItemResponse>,
    pub subtotal_cents: i64,
    pub shipping_fee_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub shipping_address: String,
    pub tracking_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub vendor_id: String,
    pub name: String,
    pub image: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub subtotal_cents: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            order_number: order.order_number.to_string(),
            buyer_id: order.buyer_id.to_string(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    vendor_id: item.vendor_id.to_string(),
                    name: item.name.clone(),
                    image: item.image.clone(),
                    unit_price_cents: item.unit_price.cents(),
                    quantity: item.quantity,
                    subtotal_cents: item.subtotal.cents(),
                })
                .collect(),
            subtotal_cents: order.subtotal.cents(),
            shipping_fee_cents: order.shipping_fee.cents(),
            tax_cents: order.tax.cents(),
            total_cents: order.total.cents(),
            status: order.status.to_string(),
            payment_status: order.payment_status.to_string(),
            payment_method: order.payment_method.clone(),
            shipping_address: order.shipping_address.clone(),
            tracking_number: order.tracking_number.clone(),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /orders — check out the buyer's saved cart.
#[tracing::instrument(skip(state, headers, req))]
pub async fn place<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let buyer_id = identity::buyer_id(&headers)?;
    let input = PlaceOrderInput::new(req.shipping_address, req.payment_method);

    let order = state.assembler.checkout(buyer_id, input).await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders — the buyer's order history, newest first.
#[tracing::instrument(skip(state, headers))]
pub async fn list<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let buyer_id = identity::buyer_id(&headers)?;
    let orders = state.store.list_orders_for_buyer(buyer_id).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id} — one of the buyer's own orders.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let buyer_id = identity::buyer_id(&headers)?;

    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    if order.buyer_id != buyer_id {
        return Err(ApiError::Forbidden(
            "You are not authorized to view this order".to_string(),
        ));
    }

    Ok(Json(OrderResponse::from(&order)))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}
