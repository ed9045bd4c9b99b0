//! HTTP routes, one module per area of the API.
//!
//! Handlers follow the same shape: extract the identity, check a
//! `canopeum::permission` predicate against facts loaded from the database,
//! run the queries (in a transaction when several rows change together) and
//! answer with a view.

use axum::Router;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use canopeum::Actor;
use canopeum::Role;
use canopeum::permission::{SiteAccess, can_manage_site, can_read_site};
use canopeum_db::Connection;
use canopeum_db::model::Site;
use canopeum_db::queries::site::{admin_site_ids, all_site_ids, is_site_admin, site_by_id};
use canopeum_db::queries::social::PrivateAccess;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::error::{ApiError, ApiResult};
use crate::middleware::request_tracing;
use crate::state::AppState;

mod assets;
mod auth;
mod batches;
mod lookups;
mod sites;
mod social;
mod users;

/// JSON request body; a malformed body is a 400 field error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub(crate) struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub(crate) struct QueryParams<T>(pub T);

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes(&state))
        .merge(lookups::routes())
        .merge(sites::routes(&state))
        .merge(batches::routes())
        .merge(social::routes())
        .merge(assets::routes())
        .nest_service("/media", ServeDir::new(state.media.root()))
        .layer(middleware::from_fn(request_tracing))
        .layer(cors(&state.config.server.cors_origins))
        .with_state(state)
}

/// Configured origins, or any origin when none are listed.
fn cors(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if parsed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(parsed))
    }
}

async fn site_and_access(
    conn: &impl Connection,
    actor: Option<&Actor>,
    site_id: i64,
) -> ApiResult<(Site, SiteAccess)> {
    let site = site_by_id(conn, site_id).await?.ok_or(ApiError::NotFound)?;
    let is_admin = match actor {
        Some(actor) if !actor.is_mega_admin() => is_site_admin(conn, actor.user_id, site_id).await?,
        _ => false,
    };
    let access = SiteAccess {
        is_public: site.is_public,
        is_admin,
    };
    Ok((site, access))
}

/// The site, if the actor may read it. Unreadable sites answer 404.
pub(crate) async fn readable_site(
    conn: &impl Connection,
    actor: Option<&Actor>,
    site_id: i64,
) -> ApiResult<Site> {
    let (site, access) = site_and_access(conn, actor, site_id).await?;
    if !can_read_site(actor, access) {
        return Err(ApiError::NotFound);
    }
    Ok(site)
}

/// The site, if the actor may manage it.
pub(crate) async fn managed_site(conn: &impl Connection, actor: &Actor, site_id: i64) -> ApiResult<Site> {
    let (site, access) = site_and_access(conn, Some(actor), site_id).await?;
    if !can_read_site(Some(actor), access) {
        return Err(ApiError::NotFound);
    }
    if !can_manage_site(actor, access.is_admin) {
        return Err(ApiError::Forbidden);
    }
    Ok(site)
}

/// Ids of the sites the actor manages; every site for a MegaAdmin.
pub(crate) async fn managed_site_ids(conn: &impl Connection, actor: &Actor) -> ApiResult<Vec<i64>> {
    if actor.is_mega_admin() {
        Ok(all_site_ids(conn).await?)
    } else {
        Ok(admin_site_ids(conn, actor.user_id).await?)
    }
}

/// Private sites whose posts the actor may read.
pub(crate) async fn private_access(conn: &impl Connection, actor: Option<&Actor>) -> ApiResult<PrivateAccess> {
    Ok(match actor.map(|actor| (actor, actor.role)) {
        Some((_, Role::MegaAdmin)) => PrivateAccess::All,
        Some((actor, Role::ForestSteward)) => {
            PrivateAccess::Sites(admin_site_ids(conn, actor.user_id).await?)
        }
        Some((_, Role::User)) | None => PrivateAccess::None,
    })
}

/// `(tree_type_id, quantity)` as sent by clients.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub(crate) struct QuantityInput {
    pub id: i64,
    pub quantity: i32,
}

/// Pairs for the query layer; negative quantities are a field error.
pub(crate) fn quantities(field: &str, items: &[QuantityInput]) -> ApiResult<Vec<(i64, i32)>> {
    if items.iter().any(|item| item.quantity < 0) {
        return Err(ApiError::field(
            field,
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    Ok(items.iter().map(|item| (item.id, item.quantity)).collect())
}

/// Reject blank required strings.
pub(crate) fn required(errors: &mut crate::error::FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors
            .entry(field.to_string())
            .or_default()
            .push("This field may not be blank.".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_quantities_are_rejected() {
        let items = [
            QuantityInput { id: 1, quantity: 3 },
            QuantityInput { id: 2, quantity: -1 },
        ];
        assert!(matches!(
            quantities("species", &items),
            Err(ApiError::Validation(errors)) if errors.contains_key("species")
        ));
        assert_eq!(quantities("species", &items[..1]).unwrap(), vec![(1, 3)]);
    }

    #[test]
    fn blank_strings_are_collected() {
        let mut errors = crate::error::FieldErrors::new();
        required(&mut errors, "name", "  ");
        required(&mut errors, "email", "a@b.c");
        assert_eq!(errors.keys().collect::<Vec<_>>(), ["name"]);
    }
}
