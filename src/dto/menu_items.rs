use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::MenuItem;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMenuItemRequest {
    pub title: String,
    pub price: i64,
    #[serde(default)]
    pub featured: bool,
    pub category_id: Uuid,
}

/// Full replace; every field required.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceMenuItemRequest {
    pub title: String,
    pub price: i64,
    pub featured: bool,
    pub category_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMenuItemRequest {
    pub title: Option<String>,
    pub price: Option<i64>,
    pub featured: Option<bool>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MenuItemList {
    pub items: Vec<MenuItem>,
}
