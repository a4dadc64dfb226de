use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CreateOrderRequest, OrderItemList, OrderItemView, OrderList, OrderView, UpdateOrderRequest,
    },
    entity::{
        CartItems, MenuItems, OrderItems, Orders, UserGroups, Users, cart_items, groups,
        order_items::ActiveModel as OrderItemActive,
        orders::{self, ActiveModel as OrderActive},
        user_groups, users,
    },
    error::{AppError, AppResult},
    middleware::auth::{
        AuthUser, DELIVERY_CREW_GROUP, Role, ensure_customer, ensure_manager,
    },
    models::UserSummary,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, OrderSortBy, SortOrder},
    services::menu_service::{category_titles, menu_item_view},
    state::AppState,
};

/// Role-scoped queryset: delivery crew sees assignments, managers see
/// everything, customers see their own orders. Outside-scope lookups
/// fall through to NotFound.
fn scoped_orders(user: &AuthUser) -> Select<Orders> {
    match user.role {
        Role::DeliveryCrew => {
            Orders::find().filter(orders::Column::DeliveryCrewId.eq(user.user_id))
        }
        Role::Manager => Orders::find(),
        Role::Customer => Orders::find().filter(orders::Column::UserId.eq(user.user_id)),
    }
}

async fn ensure_delivery_crew_member<C>(conn: &C, crew_id: Uuid) -> AppResult<()>
where
    C: ConnectionTrait,
{
    let exists = Users::find_by_id(crew_id).one(conn).await?.is_some();
    if !exists {
        return Err(AppError::BadRequest(
            "Delivery crew user does not exist".into(),
        ));
    }

    let member = UserGroups::find()
        .join(JoinType::InnerJoin, user_groups::Relation::Groups.def())
        .filter(user_groups::Column::UserId.eq(crew_id))
        .filter(groups::Column::Name.eq(DELIVERY_CREW_GROUP))
        .count(conn)
        .await?
        > 0;
    if !member {
        return Err(AppError::BadRequest(
            "Delivery crew ID is not in delivery crew group".into(),
        ));
    }

    Ok(())
}

async fn user_summary<C>(conn: &C, id: Uuid) -> AppResult<Option<UserSummary>>
where
    C: ConnectionTrait,
{
    let summary = Users::find_by_id(id).one(conn).await?.map(|user| UserSummary {
        id: user.id,
        username: user.username,
        email: user.email,
    });
    Ok(summary)
}

async fn order_view<C>(conn: &C, role: Role, order: &orders::Model) -> AppResult<OrderView>
where
    C: ConnectionTrait,
{
    if role == Role::Customer {
        return Ok(OrderView::for_role(role, order, None, None));
    }

    let user = user_summary(conn, order.user_id).await?;
    let crew = match order.delivery_crew_id {
        Some(id) => user_summary(conn, id).await?,
        None => None,
    };
    Ok(OrderView::for_role(role, order, user, crew))
}

/// One batched user lookup for a page of orders.
async fn build_order_views<C>(
    conn: &C,
    role: Role,
    orders: Vec<orders::Model>,
) -> AppResult<Vec<OrderView>>
where
    C: ConnectionTrait,
{
    let mut ids: Vec<Uuid> = Vec::new();
    if role != Role::Customer {
        for order in &orders {
            ids.push(order.user_id);
            if let Some(crew_id) = order.delivery_crew_id {
                ids.push(crew_id);
            }
        }
    }
    ids.sort();
    ids.dedup();

    let summaries: HashMap<Uuid, UserSummary> = if ids.is_empty() {
        HashMap::new()
    } else {
        Users::find()
            .filter(users::Column::Id.is_in(ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|user| {
                (
                    user.id,
                    UserSummary {
                        id: user.id,
                        username: user.username,
                        email: user.email,
                    },
                )
            })
            .collect()
    };

    let views = orders
        .iter()
        .map(|order| {
            let user = summaries.get(&order.user_id).cloned();
            let crew = order
                .delivery_crew_id
                .and_then(|id| summaries.get(&id).cloned());
            OrderView::for_role(role, order, user, crew)
        })
        .collect();

    Ok(views)
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut finder = scoped_orders(user);
    if let Some(status) = query.status {
        finder = finder.filter(orders::Column::Status.eq(status));
    }

    let sort_col = match query.sort_by.unwrap_or(OrderSortBy::Date) {
        OrderSortBy::Date => orders::Column::Date,
        OrderSortBy::Total => orders::Column::Total,
    };
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = build_order_views(&state.orm, user.role, orders).await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(meta),
    ))
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderView>> {
    ensure_customer(user)?;

    // Cart snapshot, order row, item copies and cart clearing commit
    // together or not at all.
    let txn = state.orm.begin().await?;

    let cart = CartItems::find()
        .filter(cart_items::Column::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .all(&txn)
        .await?;
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    if let Some(crew_id) = payload.delivery_crew_id {
        ensure_delivery_crew_member(&txn, crew_id).await?;
    }

    let total: i64 = cart.iter().map(|line| line.price).sum();

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        delivery_crew_id: Set(payload.delivery_crew_id),
        status: Set(false),
        total: Set(total),
        date: Set(Utc::now().date_naive()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for line in &cart {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            menuitem_id: Set(line.menuitem_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            price: Set(line.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    CartItems::delete_many()
        .filter(cart_items::Column::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": order.total })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        OrderView::for_role(Role::Customer, &order, None, None),
        Some(Meta::empty()),
    ))
}

pub async fn get_order_items(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderItemList>> {
    let order = scoped_orders(user)
        .filter(orders::Column::Id.eq(id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let rows = OrderItems::find()
        .filter(crate::entity::order_items::Column::OrderId.eq(order.id))
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
                OrderItemView {
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    price: line.price,
                    menuitem: menu_item_view(item, category),
                }
            })
        })
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderItemList { items },
        Some(Meta::empty()),
    ))
}

pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<OrderView>> {
    if user.role == Role::Customer {
        return Err(AppError::Forbidden);
    }

    let order = scoped_orders(user)
        .filter(orders::Column::Id.eq(id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let new_status = payload.status.unwrap_or(order.status);
    let new_crew = match user.role {
        Role::Manager => match payload.delivery_crew_id {
            Some(Some(crew_id)) => {
                ensure_delivery_crew_member(&state.orm, crew_id).await?;
                Some(crew_id)
            }
            Some(None) => None,
            None => order.delivery_crew_id,
        },
        // Delivery crew may only touch status; a crew field in the
        // body is dropped, as the original serializer did.
        _ => order.delivery_crew_id,
    };

    let mut active: OrderActive = order.into();
    active.status = Set(new_status);
    active.delivery_crew_id = Set(new_crew);
    let updated = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": updated.id, "status": updated.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let view = order_view(&state.orm, user.role, &updated).await?;
    Ok(ApiResponse::success("Order updated", view, Some(Meta::empty())))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_manager(user)?;

    // Items go with the order via the FK cascade.
    let result = Orders::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id })),
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
