use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartItemView, CartList},
    entity::{
        Categories, CartItems, MenuItems,
        cart_items::{self, ActiveModel as CartItemActive},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    response::{ApiResponse, Meta},
    services::menu_service::{category_titles, menu_item_view},
    state::AppState,
};

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    ensure_customer(user)?;

    let rows = CartItems::find()
        .filter(cart_items::Column::UserId.eq(user.user_id))
        .order_by_desc(cart_items::Column::CreatedAt)
        .find_also_related(MenuItems)
        .all(&state.orm)
        .await?;

    let titles = category_titles(
        &state.orm,
        rows.iter()
            .filter_map(|(_, item)| item.as_ref().map(|item| item.category_id)),
    )
    .await?;

    let items = rows
        .into_iter()
        .filter_map(|(line, item)| {
            item.map(|item| {
                let category = titles.get(&item.category_id).cloned().unwrap_or_default();
                CartItemView {
                    id: line.id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    price: line.price,
                    menuitem: menu_item_view(item, category),
                }
            })
        })
        .collect();

    Ok(ApiResponse::success("OK", CartList { items }, None))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItemView>> {
    ensure_customer(user)?;
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let menuitem = MenuItems::find_by_id(payload.menuitem_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Menu item does not exist".into()))?;

    let exists = CartItems::find()
        .filter(cart_items::Column::UserId.eq(user.user_id))
        .filter(cart_items::Column::MenuitemId.eq(menuitem.id))
        .count(&state.orm)
        .await?
        > 0;
    if exists {
        return Err(AppError::BadRequest("Menu item already in user cart".into()));
    }

    let price = menuitem.price * payload.quantity as i64;
    let insert = CartItemActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        menuitem_id: Set(menuitem.id),
        quantity: Set(payload.quantity),
        unit_price: Set(menuitem.price),
        price: Set(price),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await;

    // The unique index on (user_id, menuitem_id) decides concurrent
    // duplicate adds; the loser gets a conflict.
    let line = match insert {
        Ok(line) => line,
        Err(err) => {
            return Err(match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    AppError::Conflict("Menu item already in user cart".into())
                }
                _ => err.into(),
            });
        }
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "menuitem_id": menuitem.id, "quantity": line.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let category = Categories::find_by_id(menuitem.category_id)
        .one(&state.orm)
        .await?
        .map(|c| c.title)
        .unwrap_or_default();

    Ok(ApiResponse::success(
        "Added to cart",
        CartItemView {
            id: line.id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            price: line.price,
            menuitem: menu_item_view(menuitem, category),
        },
        None,
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_customer(user)?;

    CartItems::delete_many()
        .filter(cart_items::Column::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_clear",
        Some("cart_items"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
