use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::UserSummary;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddGroupUserRequest {
    pub username: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupUserList {
    pub items: Vec<UserSummary>,
}
