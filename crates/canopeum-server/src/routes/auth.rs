use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use canopeum::permission::is_current_user;
use canopeum_db::DbError;
use canopeum_db::queries::user::{
    is_token_revoked, purge_revoked_tokens, register as register_user, revoke_token,
    touch_last_login, user_by_email, user_by_id,
};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{JsonBody, required};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthUser, Claims, TokenKind};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::state::AppState;
use crate::views::user::{AuthView, UserView};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/register", post(register))
        .route("/auth/token/refresh", post(refresh))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(State(state): State<AppState>, JsonBody(body): JsonBody<LoginRequest>) -> ApiResult<Json<AuthView>> {
    let conn = state.db.get().await?;
    let Some(mut user) = user_by_email(&conn, &body.email).await? else {
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password(&body.password, &user.password_hash) {
        tracing::info!(user_id = user.id, "wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let now = Timestamp::now();
    touch_last_login(&conn, user.id, now).await?;
    user.last_login_at = Some(now);
    let token = state
        .tokens
        .issue(user.id, user.role()?, now)
        .map_err(ApiError::internal)?;
    tracing::info!(user_id = user.id, "logged in");
    Ok(Json(AuthView {
        token,
        user: UserView::load(&conn, user).await?,
    }))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    password_confirmation: String,
    #[serde(default)]
    code: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthView>)> {
    let mut errors = FieldErrors::new();
    required(&mut errors, "username", &body.username);
    required(&mut errors, "email", &body.email);
    required(&mut errors, "password", &body.password);
    if body.password != body.password_confirmation {
        errors
            .entry("password".to_string())
            .or_default()
            .push("Password fields didn't match.".to_string());
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let password_hash = hash_password(&body.password).map_err(ApiError::internal)?;
    let now = Timestamp::now();
    let code = body.code.as_deref().filter(|code| !code.is_empty());

    let mut conn = state.db.get().await?;
    let tx = conn.transaction().await.map_err(DbError::from)?;
    let user = register_user(&tx, &body.username, &body.email, &password_hash, code, now).await?;
    tx.commit().await.map_err(DbError::from)?;
    tracing::info!(user_id = user.id, role = %user.role, "registered");

    let token = state
        .tokens
        .issue(user.id, user.role()?, now)
        .map_err(ApiError::internal)?;
    let user = UserView::load(&conn, user).await?;
    Ok((StatusCode::CREATED, Json(AuthView { token, user })))
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh: String,
}

#[derive(Debug, Serialize)]
struct AccessToken {
    access: String,
}

fn verify_refresh(state: &AppState, token: &str) -> ApiResult<Claims> {
    state
        .tokens
        .verify(token, TokenKind::Refresh)
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected refresh token");
            ApiError::Unauthorized
        })
}

async fn refresh(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> ApiResult<Json<AccessToken>> {
    let claims = verify_refresh(&state, &body.refresh)?;
    let conn = state.db.get().await?;
    if is_token_revoked(&conn, &claims.jti).await? {
        return Err(ApiError::Unauthorized);
    }
    let user = user_by_id(&conn, claims.sub)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    let access = state
        .tokens
        .access(user.id, user.role()?, Timestamp::now())
        .map_err(ApiError::internal)?;
    Ok(Json(AccessToken { access }))
}

async fn logout(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> ApiResult<StatusCode> {
    let claims = verify_refresh(&state, &body.refresh)?;
    if !is_current_user(&actor, claims.sub) {
        return Err(ApiError::Forbidden);
    }
    let expires_at = claims.expires_at().map_err(ApiError::internal)?;

    let conn = state.db.get().await?;
    revoke_token(&conn, &claims.jti, expires_at).await?;
    let purged = purge_revoked_tokens(&conn, Timestamp::now()).await?;
    tracing::info!(user_id = actor.user_id, purged, "logged out");
    Ok(StatusCode::NO_CONTENT)
}
