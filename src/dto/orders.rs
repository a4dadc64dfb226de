use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::orders,
    middleware::auth::Role,
    models::{MenuItem, UserSummary},
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub delivery_crew_id: Option<Uuid>,
}

/// `delivery_crew_id` is tri-state: absent keeps the current crew,
/// null unassigns, a value reassigns after validation.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub delivery_crew_id: Option<Option<Uuid>>,
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Role-shaped order response: one builder instead of a serializer
/// class per role. Managers see both parties, delivery crew sees the
/// placer, customers see their bare order.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum OrderView {
    Manager {
        id: Uuid,
        user: UserSummary,
        delivery_crew: Option<UserSummary>,
        status: bool,
        total: i64,
        date: NaiveDate,
    },
    DeliveryCrew {
        id: Uuid,
        user: UserSummary,
        status: bool,
        total: i64,
        date: NaiveDate,
    },
    Customer {
        id: Uuid,
        delivery_crew_id: Option<Uuid>,
        status: bool,
        total: i64,
        date: NaiveDate,
    },
}

impl OrderView {
    pub fn for_role(
        role: Role,
        order: &orders::Model,
        user: Option<UserSummary>,
        delivery_crew: Option<UserSummary>,
    ) -> Self {
        match role {
            Role::Manager => OrderView::Manager {
                id: order.id,
                user: user.unwrap_or_else(|| missing_user(order.user_id)),
                delivery_crew,
                status: order.status,
                total: order.total,
                date: order.date,
            },
            Role::DeliveryCrew => OrderView::DeliveryCrew {
                id: order.id,
                user: user.unwrap_or_else(|| missing_user(order.user_id)),
                status: order.status,
                total: order.total,
                date: order.date,
            },
            Role::Customer => OrderView::Customer {
                id: order.id,
                delivery_crew_id: order.delivery_crew_id,
                status: order.status,
                total: order.total,
                date: order.date,
            },
        }
    }
}

// Placer rows are FK-protected; this only shows up if a caller maps
// the wrong user set.
fn missing_user(id: Uuid) -> UserSummary {
    UserSummary {
        id,
        username: String::new(),
        email: String::new(),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemView {
    pub menuitem: MenuItem,
    pub quantity: i32,
    pub unit_price: i64,
    pub price: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemList {
    pub items: Vec<OrderItemView>,
}
