//! Vendor fulfillment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use domain::OrderStatus;
use serde::Deserialize;
use store::OrderStore;

use crate::error::ApiError;
use crate::identity;
use crate::routes::orders::{OrderResponse, parse_order_id};
use crate::{AppState, MarketplaceStore};

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

/// GET /vendor/orders — orders containing at least one of the vendor's products.
#[tracing::instrument(skip(state, headers))]
pub async fn list<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let vendor_id = identity::vendor_id(&headers)?;
    let orders = state.store.list_orders_for_vendor(vendor_id).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// PUT /vendor/orders/{id}/status — move an order along its fulfillment lifecycle.
#[tracing::instrument(skip(state, headers, req))]
pub async fn update_status<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let vendor_id = identity::vendor_id(&headers)?;
    let status: OrderStatus = req.status.parse().map_err(ApiError::BadRequest)?;

    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    if !order.involves_vendor(vendor_id) {
        return Err(ApiError::Forbidden(
            "Order contains none of your products".to_string(),
        ));
    }

    let updated = state
        .store
        .update_order_status(order_id, status, req.tracking_number)
        .await?;
    tracing::info!(
        order_number = %updated.order_number,
        status = %updated.status,
        "order status updated"
    );

    Ok(Json(OrderResponse::from(&updated)))
}
