use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use sea_orm::{ColumnTrait, EntityTrait, JoinType, QueryFilter, QuerySelect, RelationTrait};
use uuid::Uuid;

use crate::{
    db::OrmConn,
    dto::auth::Claims,
    entity::{Groups, Users, groups, user_groups},
    error::AppError,
    state::AppState,
};

pub const MANAGER_GROUP: &str = "Manager";
pub const DELIVERY_CREW_GROUP: &str = "Delivery crew";

/// The caller's business role, resolved from group membership.
/// `Customer` is the explicit default for anyone in neither group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Manager,
    DeliveryCrew,
    Customer,
}

impl Role {
    /// Manager wins when a user is in both groups.
    pub fn from_group_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut crew = false;
        for name in names {
            if name == MANAGER_GROUP {
                return Role::Manager;
            }
            if name == DELIVERY_CREW_GROUP {
                crew = true;
            }
        }
        if crew { Role::DeliveryCrew } else { Role::Customer }
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub is_staff: bool,
    pub role: Role,
}

pub fn ensure_manager(user: &AuthUser) -> Result<(), AppError> {
    if user.role != Role::Manager {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// System admin, distinct from the Manager business role.
pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if !user.is_staff {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_customer(user: &AuthUser) -> Result<(), AppError> {
    if user.role != Role::Customer {
        return Err(AppError::BadRequest("Not a customer".into()));
    }
    Ok(())
}

/// Resolve the caller's role from group membership, fresh on every request.
/// Group edits through the admin endpoints take effect immediately.
pub async fn resolve_role(orm: &OrmConn, user_id: Uuid) -> Result<Role, AppError> {
    let names: Vec<String> = Groups::find()
        .join(JoinType::InnerJoin, groups::Relation::UserGroups.def())
        .filter(user_groups::Column::UserId.eq(user_id))
        .all(orm)
        .await?
        .into_iter()
        .map(|group| group.name)
        .collect();

    Ok(Role::from_group_names(names.iter().map(String::as_str)))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::BadRequest("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::BadRequest("Invalid Authorization scheme".into()));
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::BadRequest("Invalid or expired token".into()))?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::BadRequest("Invalid user id in token".into()))?;

        let user = Users::find_by_id(user_id)
            .one(&state.orm)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid or expired token".into()))?;

        let role = resolve_role(&state.orm, user_id).await?;

        Ok(AuthUser {
            user_id,
            username: user.username,
            is_staff: user.is_staff,
            role,
        })
    }
}
