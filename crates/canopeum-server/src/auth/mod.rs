//! Bearer-token authentication.
//!
//! Handlers ask for an identity through extractors:
//! - [`AuthUser`] rejects with 401 when the token is missing or invalid
//! - [`MaybeUser`] lets anonymous requests through, but still rejects a bad token
//! - [`MegaAdmin`] additionally answers 403 to anyone else

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use canopeum::permission::mega_admin_or_read_only;
use canopeum::{Actor, Method};

use crate::error::ApiError;
use crate::state::AppState;

pub mod jwt;
pub mod password;

pub use jwt::{Claims, TokenError, TokenKind, TokenPair, Tokens};

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

fn actor_from(state: &AppState, token: &str) -> Result<Actor, ApiError> {
    match state.tokens.verify(token, TokenKind::Access) {
        Ok(claims) => Ok(Actor::new(claims.sub, claims.role)),
        Err(e) => {
            tracing::debug!(error = %e, "rejected access token");
            Err(ApiError::Unauthorized)
        }
    }
}

pub struct AuthUser(pub Actor);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(ApiError::Unauthorized)?;
        Ok(AuthUser(actor_from(state, token)?))
    }
}

pub struct MaybeUser(pub Option<Actor>);

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer(parts) {
            Some(token) => Ok(MaybeUser(Some(actor_from(state, token)?))),
            None => Ok(MaybeUser(None)),
        }
    }
}

pub struct MegaAdmin(pub Actor);

#[axum::async_trait]
impl FromRequestParts<AppState> for MegaAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(actor) = AuthUser::from_request_parts(parts, state).await?;
        if !actor.is_mega_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(MegaAdmin(actor))
    }
}

/// Route layer: reads go through, writes need a MegaAdmin.
pub async fn read_only_unless_mega_admin(
    State(_state): State<AppState>,
    MaybeUser(actor): MaybeUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = Method::from_name(request.method().as_str()).unwrap_or(Method::Post);
    if !mega_admin_or_read_only(actor.as_ref(), method) {
        return Err(match actor {
            Some(_) => ApiError::Forbidden,
            None => ApiError::Unauthorized,
        });
    }
    Ok(next.run(request).await)
}
