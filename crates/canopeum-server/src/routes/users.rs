use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use canopeum::permission::is_current_user;
use canopeum_db::DbError;
use canopeum_db::queries::user::{
    UserUpdate, all_users, forest_stewards_with_sites, insert_invitation, update_user,
    user_by_id, validate_invitation,
};
use jiff::Timestamp;
use serde::Deserialize;

use super::{JsonBody, required};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthUser, MegaAdmin, read_only_unless_mega_admin};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::state::AppState;
use crate::views::user::{AdminUserSitesView, InvitationView, UserView};

pub(super) fn routes(state: &AppState) -> Router<AppState> {
    let invitations = Router::new()
        .route("/user-invitations", post(create_invitation))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            read_only_unless_mega_admin,
        ));

    Router::new()
        .route("/users", get(list_users))
        .route("/users/current_user", get(current_user))
        .route("/users/admin-user-sites", get(admin_user_sites))
        .route("/users/:id", get(user_detail).patch(patch_user))
        .route("/user-invitations/:code", get(check_invitation))
        .merge(invitations)
}

async fn list_users(State(state): State<AppState>, MegaAdmin(_): MegaAdmin) -> ApiResult<Json<Vec<UserView>>> {
    let conn = state.db.get().await?;
    let mut views = Vec::new();
    for user in all_users(&conn).await? {
        views.push(UserView::load(&conn, user).await?);
    }
    Ok(Json(views))
}

async fn current_user(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<UserView>> {
    let conn = state.db.get().await?;
    let user = user_by_id(&conn, actor.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(UserView::load(&conn, user).await?))
}

async fn admin_user_sites(
    State(state): State<AppState>,
    MegaAdmin(_): MegaAdmin,
) -> ApiResult<Json<Vec<AdminUserSitesView>>> {
    let conn = state.db.get().await?;
    let stewards = forest_stewards_with_sites(&conn).await?;
    Ok(Json(stewards.into_iter().map(Into::into).collect()))
}

async fn user_detail(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserView>> {
    if !is_current_user(&actor, id) {
        return Err(ApiError::Forbidden);
    }
    let conn = state.db.get().await?;
    let user = user_by_id(&conn, id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(UserView::load(&conn, user).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserPatch {
    username: Option<String>,
    email: Option<String>,
    old_password: Option<String>,
    new_password: Option<String>,
    new_password_confirmation: Option<String>,
}

async fn patch_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<UserPatch>,
) -> ApiResult<Json<UserView>> {
    if !is_current_user(&actor, id) {
        return Err(ApiError::Forbidden);
    }
    let conn = state.db.get().await?;
    let user = user_by_id(&conn, id).await?.ok_or(ApiError::NotFound)?;

    let mut errors = FieldErrors::new();
    if let Some(username) = &body.username {
        required(&mut errors, "username", username);
    }
    if let Some(email) = &body.email {
        required(&mut errors, "email", email);
    }
    let password_hash = match &body.new_password {
        Some(new_password) => {
            let old_password = body.old_password.as_deref().unwrap_or_default();
            if !verify_password(old_password, &user.password_hash) {
                errors
                    .entry("old_password".to_string())
                    .or_default()
                    .push("Old password is not correct.".to_string());
            }
            if body.new_password_confirmation.as_deref() != Some(new_password.as_str()) {
                errors
                    .entry("new_password".to_string())
                    .or_default()
                    .push("Password fields didn't match.".to_string());
            }
            required(&mut errors, "new_password", new_password);
            Some(hash_password(new_password).map_err(ApiError::internal)?)
        }
        None => None,
    };
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let update = UserUpdate {
        username: body.username,
        email: body.email,
        password_hash,
    };
    let user = update_user(&conn, id, &update)
        .await?
        .ok_or(ApiError::NotFound)?;
    tracing::info!(user_id = id, by = actor.user_id, "updated user");
    Ok(Json(UserView::load(&conn, user).await?))
}

#[derive(Debug, Deserialize)]
struct InvitationRequest {
    email: String,
    #[serde(default)]
    site_ids: Vec<i64>,
}

async fn create_invitation(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<InvitationRequest>,
) -> ApiResult<(StatusCode, Json<InvitationView>)> {
    let mut errors = FieldErrors::new();
    required(&mut errors, "email", &body.email);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let mut conn = state.db.get().await?;
    let tx = conn.transaction().await.map_err(DbError::from)?;
    let invitation = insert_invitation(&tx, &body.email, &body.site_ids, Timestamp::now()).await?;
    tx.commit().await.map_err(DbError::from)?;
    tracing::info!(
        invitation_id = invitation.id,
        by = actor.user_id,
        sites = body.site_ids.len(),
        "created invitation"
    );
    Ok((StatusCode::CREATED, Json(invitation.into())))
}

async fn check_invitation(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<InvitationView>> {
    let conn = state.db.get().await?;
    let invitation = validate_invitation(&conn, &code, Timestamp::now()).await?;
    Ok(Json(invitation.into()))
}
