use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::cart::{AddToCartRequest, CartItemView, CartList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/menu-items",
        get(cart_list).post(add_to_cart).delete(clear_cart),
    )
}

#[utoipa::path(
    get,
    path = "/api/cart/menu-items",
    responses(
        (status = 200, description = "List cart items for current user", body = ApiResponse<CartList>),
        (status = 400, description = "Not a customer"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::list_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/menu-items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add cart item", body = ApiResponse<CartItemView>),
        (status = 400, description = "Bad request or duplicate line"),
        (status = 409, description = "Lost a concurrent duplicate add"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItemView>>> {
    let resp = cart_service::add_to_cart(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/menu-items",
    responses(
        (status = 200, description = "Clear cart", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Not a customer"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::clear_cart(&state, &user).await?;
    Ok(Json(resp))
}
