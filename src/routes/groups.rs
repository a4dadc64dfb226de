use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::groups::{AddGroupUserRequest, GroupUserList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::group_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{group_name}/users",
            get(list_group_users).post(add_group_user),
        )
        .route("/{group_name}/users/{id}", delete(remove_group_user))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_name}/users",
    params(
        ("group_name" = String, Path, description = "Group slug: manager, delivery-crew")
    ),
    responses(
        (status = 200, description = "List group members", body = ApiResponse<GroupUserList>),
        (status = 400, description = "Group not supported"),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn list_group_users(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_name): Path<String>,
) -> AppResult<Json<ApiResponse<GroupUserList>>> {
    let resp = group_service::list_group_users(&state, &user, &group_name).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_name}/users",
    params(
        ("group_name" = String, Path, description = "Group slug: manager, delivery-crew")
    ),
    request_body = AddGroupUserRequest,
    responses(
        (status = 200, description = "Add user to group", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Group not supported or missing username"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Unknown username"),
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn add_group_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(group_name): Path<String>,
    Json(payload): Json<AddGroupUserRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = group_service::add_group_user(&state, &user, &group_name, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/groups/{group_name}/users/{id}",
    params(
        ("group_name" = String, Path, description = "Group slug: manager, delivery-crew"),
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Remove user from group", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Group not supported"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Unknown user"),
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn remove_group_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path((group_name, id)): Path<(String, Uuid)>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = group_service::remove_group_user(&state, &user, &group_name, id).await?;
    Ok(Json(resp))
}
