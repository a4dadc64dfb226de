use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DbErr, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::groups::{AddGroupUserRequest, GroupUserList},
    entity::{Groups, UserGroups, Users, groups, user_groups, users},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, DELIVERY_CREW_GROUP, MANAGER_GROUP, ensure_admin},
    models::UserSummary,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// URL slugs for the two administrable groups.
const GROUP_SLUGS: &[(&str, &str)] = &[
    ("manager", MANAGER_GROUP),
    ("delivery-crew", DELIVERY_CREW_GROUP),
];

fn stored_group_name(slug: &str) -> AppResult<&'static str> {
    GROUP_SLUGS
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, name)| *name)
        .ok_or_else(|| AppError::BadRequest("Group not supported".into()))
}

async fn group_row(state: &AppState, name: &str) -> AppResult<groups::Model> {
    Groups::find()
        .filter(groups::Column::Name.eq(name))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("group row missing: {name}")))
}

pub async fn list_group_users(
    state: &AppState,
    user: &AuthUser,
    slug: &str,
) -> AppResult<ApiResponse<GroupUserList>> {
    ensure_admin(user)?;
    let name = stored_group_name(slug)?;

    let items = Users::find()
        .join(JoinType::InnerJoin, users::Relation::UserGroups.def())
        .join(JoinType::InnerJoin, user_groups::Relation::Groups.def())
        .filter(groups::Column::Name.eq(name))
        .order_by_asc(users::Column::Username)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|member| UserSummary {
            id: member.id,
            username: member.username,
            email: member.email,
        })
        .collect();

    Ok(ApiResponse::success(
        "Group members",
        GroupUserList { items },
        Some(Meta::empty()),
    ))
}

pub async fn add_group_user(
    state: &AppState,
    user: &AuthUser,
    slug: &str,
    payload: AddGroupUserRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let name = stored_group_name(slug)?;

    let username = payload
        .username
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing username field".into()))?;

    let target = Users::find()
        .filter(users::Column::Username.eq(username.clone()))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let group = group_row(state, name).await?;

    // Re-adding an existing member is a no-op.
    let insert = UserGroups::insert(user_groups::ActiveModel {
        user_id: Set(target.id),
        group_id: Set(group.id),
    })
    .on_conflict(
        OnConflict::columns([
            user_groups::Column::UserId,
            user_groups::Column::GroupId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec(&state.orm)
    .await;
    match insert {
        Ok(_) | Err(DbErr::RecordNotInserted) => {}
        Err(err) => return Err(err.into()),
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "group_user_add",
        Some("user_groups"),
        Some(serde_json::json!({ "target_id": target.id, "group": name })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        format!("User {username} added to group {name} successfully."),
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn remove_group_user(
    state: &AppState,
    user: &AuthUser,
    slug: &str,
    target_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let name = stored_group_name(slug)?;

    let target = Users::find_by_id(target_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let group = group_row(state, name).await?;

    UserGroups::delete_many()
        .filter(user_groups::Column::UserId.eq(target.id))
        .filter(user_groups::Column::GroupId.eq(group.id))
        .exec(&state.orm)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "group_user_remove",
        Some("user_groups"),
        Some(serde_json::json!({ "target_id": target.id, "group": name })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        format!(
            "User {} removed from group {name} successfully.",
            target.username
        ),
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
