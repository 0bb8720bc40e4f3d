//! Buyer cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use domain::{Cart, CartLine, DomainError, Product, ProductId};
use serde::{Deserialize, Serialize};
use store::{CartStore, ProductCatalog};

use crate::error::ApiError;
use crate::identity;
use crate::{AppState, MarketplaceStore};

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub buyer_id: String,
    pub items: Vec<CartLineResponse>,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub product_id: String,
    pub name: String,
    pub image: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            buyer_id: cart.buyer_id.to_string(),
            items: cart
                .lines()
                .iter()
                .map(|line| CartLineResponse {
                    product_id: line.product_id.to_string(),
                    name: line.name.clone(),
                    image: line.image.clone(),
                    unit_price_cents: line.unit_price.cents(),
                    quantity: line.quantity,
                })
                .collect(),
            subtotal_cents: cart
                .lines()
                .iter()
                .map(|line| line.unit_price.multiply(line.quantity))
                .sum::<domain::Money>()
                .cents(),
        }
    }
}

// -- Handlers --

/// GET /cart — the buyer's cart, empty if nothing was ever added.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, ApiError> {
    let buyer_id = identity::buyer_id(&headers)?;
    let cart = state.store.get_cart(buyer_id).await?;
    Ok(Json(CartResponse::from(&cart)))
}

/// POST /cart/items — add a product, merging with an existing line.
///
/// Name, image and price are captured from the catalog.
#[tracing::instrument(skip(state, headers, req))]
pub async fn add_item<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let buyer_id = identity::buyer_id(&headers)?;
    if req.quantity == 0 {
        return Err(DomainError::InvalidQuantity { quantity: 0 }.into());
    }

    let product = load_product(&state, &ProductId::new(req.product_id)).await?;
    let mut cart = state.store.get_cart(buyer_id).await?;

    let wanted = cart
        .quantity_of(&product.id)
        .saturating_add(req.quantity);
    ensure_in_stock(&product, wanted)?;

    cart.add_line(
        CartLine::new(product.id.clone(), product.name.clone(), product.price, req.quantity)
            .with_image(product.image.clone()),
    )?;
    state.store.save_cart(&cart).await?;

    Ok(Json(CartResponse::from(&cart)))
}

/// PUT /cart/items/{product_id} — replace a line's quantity.
#[tracing::instrument(skip(state, headers, req))]
pub async fn update_item<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let buyer_id = identity::buyer_id(&headers)?;
    let product = load_product(&state, &ProductId::new(product_id)).await?;
    ensure_in_stock(&product, req.quantity)?;

    let mut cart = state.store.get_cart(buyer_id).await?;
    cart.update_quantity(&product.id, req.quantity)?;
    state.store.save_cart(&cart).await?;

    Ok(Json(CartResponse::from(&cart)))
}

/// DELETE /cart/items/{product_id} — drop a line.
#[tracing::instrument(skip(state, headers))]
pub async fn remove_item<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let buyer_id = identity::buyer_id(&headers)?;
    let product_id = ProductId::new(product_id);

    let mut cart = state.store.get_cart(buyer_id).await?;
    if !cart.remove_line(&product_id) {
        return Err(DomainError::ItemNotFound {
            product_id: product_id.to_string(),
        }
        .into());
    }
    state.store.save_cart(&cart).await?;

    Ok(Json(CartResponse::from(&cart)))
}

/// DELETE /cart — empty the cart.
#[tracing::instrument(skip(state, headers))]
pub async fn clear<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let buyer_id = identity::buyer_id(&headers)?;
    state.store.clear_cart(buyer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn load_product<S: MarketplaceStore>(
    state: &AppState<S>,
    product_id: &ProductId,
) -> Result<Product, ApiError> {
    state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {product_id} not found")))
}

fn ensure_in_stock(product: &Product, quantity: u32) -> Result<(), ApiError> {
    if product.has_stock_for(quantity) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Requested quantity {quantity} exceeds available stock {} for {}",
            product.stock, product.id
        )))
    }
}
