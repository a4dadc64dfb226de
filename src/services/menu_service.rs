use std::collections::HashMap;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::menu_items::{
        CreateMenuItemRequest, MenuItemList, ReplaceMenuItemRequest, UpdateMenuItemRequest,
    },
    entity::{
        Categories, MenuItems, categories,
        menu_items::{self, ActiveModel as MenuItemActive},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_manager},
    models::MenuItem,
    response::{ApiResponse, Meta},
    routes::params::{MenuItemQuery, MenuItemSortBy, SortOrder},
    state::AppState,
};

pub fn menu_item_view(model: menu_items::Model, category_title: String) -> MenuItem {
    MenuItem {
        id: model.id,
        title: model.title,
        price: model.price,
        featured: model.featured,
        category: category_title,
        category_id: model.category_id,
    }
}

/// Batch-resolve category titles for nested menu item views.
pub async fn category_titles<C, I>(conn: &C, ids: I) -> AppResult<HashMap<Uuid, String>>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = Uuid>,
{
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let titles = Categories::find()
        .filter(categories::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|category| (category.id, category.title))
        .collect();

    Ok(titles)
}

pub async fn list_menu_items(
    state: &AppState,
    query: MenuItemQuery,
) -> AppResult<ApiResponse<MenuItemList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut finder = MenuItems::find();
    if let Some(q) = query.q.as_ref().filter(|s| !s.is_empty()) {
        finder = finder.filter(menu_items::Column::Title.contains(q.as_str()));
    }
    if let Some(featured) = query.featured {
        finder = finder.filter(menu_items::Column::Featured.eq(featured));
    }
    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        let category = Categories::find()
            .filter(categories::Column::Title.eq(category.clone()))
            .one(&state.orm)
            .await?;
        match category {
            Some(category) => {
                finder = finder.filter(menu_items::Column::CategoryId.eq(category.id));
            }
            None => {
                let meta = Meta::new(page, limit, 0);
                return Ok(ApiResponse::success(
                    "Menu items",
                    MenuItemList { items: Vec::new() },
                    Some(meta),
                ));
            }
        }
    }

    let sort_col = match query.sort_by.unwrap_or(MenuItemSortBy::Title) {
        MenuItemSortBy::Title => menu_items::Column::Title,
        MenuItemSortBy::Price => menu_items::Column::Price,
    };
    finder = match query.sort_order.unwrap_or(SortOrder::Asc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .find_also_related(Categories)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(item, category)| {
            let title = category.map(|c| c.title).unwrap_or_default();
            menu_item_view(item, title)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Menu items",
        MenuItemList { items },
        Some(meta),
    ))
}

pub async fn get_menu_item(state: &AppState, id: Uuid) -> AppResult<ApiResponse<MenuItem>> {
    let found = MenuItems::find_by_id(id)
        .find_also_related(Categories)
        .one(&state.orm)
        .await?;
    let (item, category) = match found {
        Some(pair) => pair,
        None => return Err(AppError::NotFound),
    };

    let title = category.map(|c| c.title).unwrap_or_default();
    Ok(ApiResponse::success(
        "Menu item",
        menu_item_view(item, title),
        None,
    ))
}

pub async fn create_menu_item(
    state: &AppState,
    user: &AuthUser,
    payload: CreateMenuItemRequest,
) -> AppResult<ApiResponse<MenuItem>> {
    ensure_manager(user)?;
    if payload.price <= 0 {
        return Err(AppError::BadRequest("price must be greater than 0".into()));
    }

    let category = Categories::find_by_id(payload.category_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Category does not exist".into()))?;

    let item = MenuItemActive {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title),
        price: Set(payload.price),
        featured: Set(payload.featured),
        category_id: Set(category.id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "menu_item_create",
        Some("menu_items"),
        Some(serde_json::json!({ "menuitem_id": item.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Menu item created",
        menu_item_view(item, category.title),
        Some(Meta::empty()),
    ))
}

pub async fn replace_menu_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ReplaceMenuItemRequest,
) -> AppResult<ApiResponse<MenuItem>> {
    ensure_manager(user)?;
    if payload.price <= 0 {
        return Err(AppError::BadRequest("price must be greater than 0".into()));
    }

    let existing = MenuItems::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let category = Categories::find_by_id(payload.category_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Category does not exist".into()))?;

    let mut active: MenuItemActive = existing.into();
    active.title = Set(payload.title);
    active.price = Set(payload.price);
    active.featured = Set(payload.featured);
    active.category_id = Set(category.id);
    let item = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "menu_item_update",
        Some("menu_items"),
        Some(serde_json::json!({ "menuitem_id": item.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Menu item updated",
        menu_item_view(item, category.title),
        Some(Meta::empty()),
    ))
}

pub async fn update_menu_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateMenuItemRequest,
) -> AppResult<ApiResponse<MenuItem>> {
    ensure_manager(user)?;
    if let Some(price) = payload.price {
        if price <= 0 {
            return Err(AppError::BadRequest("price must be greater than 0".into()));
        }
    }

    let existing = MenuItems::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let category_id = payload.category_id.unwrap_or(existing.category_id);
    let category = Categories::find_by_id(category_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Category does not exist".into()))?;

    let title = payload.title.unwrap_or_else(|| existing.title.clone());
    let price = payload.price.unwrap_or(existing.price);
    let featured = payload.featured.unwrap_or(existing.featured);

    let mut active: MenuItemActive = existing.into();
    active.title = Set(title);
    active.price = Set(price);
    active.featured = Set(featured);
    active.category_id = Set(category.id);
    let item = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "menu_item_update",
        Some("menu_items"),
        Some(serde_json::json!({ "menuitem_id": item.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Menu item updated",
        menu_item_view(item, category.title),
        Some(Meta::empty()),
    ))
}

pub async fn delete_menu_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_manager(user)?;

    let result = MenuItems::delete_by_id(id).exec(&state.orm).await;
    let result = match result {
        Ok(result) => result,
        Err(err) => {
            return Err(match err.sql_err() {
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                    AppError::Conflict("Menu item is referenced by existing orders".into())
                }
                _ => err.into(),
            });
        }
    };
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "menu_item_delete",
        Some("menu_items"),
        Some(serde_json::json!({ "menuitem_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
