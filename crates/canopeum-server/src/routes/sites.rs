use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router, middleware};
use canopeum::{Actor, Coordinate, Weather};
use canopeum_db::{Connection, DbError};
use canopeum_db::model::Site;
use canopeum_db::queries::site::{
    NewSite, SiteUpdate, coordinate_by_id, create_site as insert_site, delete_site as remove_site,
    map_sites, replace_site_admins, replace_tree_species, set_site_coordinate, site_admins,
    site_by_id, site_sponsors, sites_by_ids, update_site,
};
use serde::Deserialize;

use super::{JsonBody, QuantityInput, managed_site, managed_site_ids, quantities, required};
use crate::auth::{AuthUser, MegaAdmin, read_only_unless_mega_admin};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::state::AppState;
use crate::views::batch::SponsorView;
use crate::views::site::{
    SiteMapView, SiteSummaryDetailView, SiteSummaryView, SiteView, UserSummaryView,
};

pub(super) fn routes(state: &AppState) -> Router<AppState> {
    let mega_admin_writes = Router::new()
        .route("/analytics/sites", get(list_sites).post(create_site))
        .route("/analytics/sites/:id/admins", patch(replace_admins))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            read_only_unless_mega_admin,
        ));

    Router::new()
        .route("/analytics/sites/summary", get(summaries))
        .route(
            "/analytics/sites/:id",
            get(site_detail).patch(patch_site).delete(delete_site),
        )
        .route("/analytics/sites/:id/summary", get(summary_detail))
        .route("/map/sites", get(map))
        .merge(mega_admin_writes)
}

async fn managed_sites(conn: &impl Connection, actor: &Actor) -> ApiResult<Vec<Site>> {
    let ids = managed_site_ids(conn, actor).await?;
    Ok(sites_by_ids(conn, &ids).await?)
}

async fn list_sites(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Vec<SiteView>>> {
    let conn = state.db.get().await?;
    let sites = managed_sites(&conn, &actor).await?;
    let mut views = Vec::with_capacity(sites.len());
    for site in sites {
        views.push(SiteView::load(&conn, &state.media, site).await?);
    }
    Ok(Json(views))
}

#[derive(Debug, Deserialize)]
struct SiteRequest {
    name: String,
    #[serde(default)]
    is_public: bool,
    site_type_id: Option<i64>,
    dms_latitude: String,
    dms_longitude: String,
    description: Option<String>,
    size: Option<String>,
    research_partnership: Option<bool>,
    visible_map: Option<bool>,
    visitor_count: Option<i32>,
    image_id: Option<i64>,
    #[serde(default)]
    species: Vec<QuantityInput>,
}

async fn create_site(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<SiteRequest>,
) -> ApiResult<(StatusCode, Json<SiteView>)> {
    let mut errors = FieldErrors::new();
    required(&mut errors, "name", &body.name);
    required(&mut errors, "dms_latitude", &body.dms_latitude);
    required(&mut errors, "dms_longitude", &body.dms_longitude);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let species = quantities("species", &body.species)?;
    let coordinate =
        Coordinate::from_dms(&body.dms_latitude, &body.dms_longitude, state.geocoder.as_ref()).await?;

    let new = NewSite {
        name: body.name,
        is_public: body.is_public,
        site_type_id: body.site_type_id,
        coordinate,
        description: body.description,
        size: body.size,
        research_partnership: body.research_partnership,
        visible_map: body.visible_map,
        visitor_count: body.visitor_count,
        image_id: body.image_id,
        species,
    };
    let mut conn = state.db.get().await?;
    let tx = conn.transaction().await.map_err(DbError::from)?;
    let site = insert_site(&tx, &new).await?;
    tx.commit().await.map_err(DbError::from)?;
    tracing::info!(site_id = site.id, by = actor.user_id, "site created");

    Ok((StatusCode::CREATED, Json(SiteView::load(&conn, &state.media, site).await?)))
}

async fn site_detail(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SiteView>> {
    let conn = state.db.get().await?;
    let site = managed_site(&conn, &actor, id).await?;
    Ok(Json(SiteView::load(&conn, &state.media, site).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SitePatch {
    name: Option<String>,
    site_type_id: Option<i64>,
    dms_latitude: Option<String>,
    dms_longitude: Option<String>,
    description: Option<String>,
    size: Option<String>,
    research_partnership: Option<bool>,
    visible_map: Option<bool>,
    visitor_count: Option<i32>,
    image_id: Option<i64>,
    species: Option<Vec<QuantityInput>>,
}

async fn patch_site(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<SitePatch>,
) -> ApiResult<Json<SiteView>> {
    let coordinate = match (&body.dms_latitude, &body.dms_longitude) {
        (Some(latitude), Some(longitude)) => {
            Some(Coordinate::from_dms(latitude, longitude, state.geocoder.as_ref()).await?)
        }
        (None, None) => None,
        (Some(_), None) => {
            return Err(ApiError::field("dms_longitude", "Required with dms_latitude."));
        }
        (None, Some(_)) => {
            return Err(ApiError::field("dms_latitude", "Required with dms_longitude."));
        }
    };
    let species = body
        .species
        .as_deref()
        .map(|items| quantities("species", items))
        .transpose()?;

    let mut conn = state.db.get().await?;
    let site = managed_site(&conn, &actor, id).await?;

    let update = SiteUpdate {
        name: body.name,
        site_type_id: body.site_type_id,
        description: body.description,
        size: body.size,
        research_partnership: body.research_partnership,
        visible_map: body.visible_map,
        visitor_count: body.visitor_count,
        image_id: body.image_id,
    };
    let tx = conn.transaction().await.map_err(DbError::from)?;
    let site = match update_site(&tx, site.id, &update).await? {
        Some(site) => site,
        None => return Err(ApiError::NotFound),
    };
    let site = match &coordinate {
        Some(coordinate) => set_site_coordinate(&tx, site, coordinate).await?,
        None => site,
    };
    if let Some(species) = &species {
        replace_tree_species(&tx, site.id, species).await?;
    }
    tx.commit().await.map_err(DbError::from)?;
    tracing::info!(site_id = site.id, by = actor.user_id, "site updated");

    Ok(Json(SiteView::load(&conn, &state.media, site).await?))
}

async fn delete_site(
    State(state): State<AppState>,
    MegaAdmin(actor): MegaAdmin,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut conn = state.db.get().await?;
    let tx = conn.transaction().await.map_err(DbError::from)?;
    let Some(paths) = remove_site(&tx, id).await? else {
        return Err(ApiError::NotFound);
    };
    tx.commit().await.map_err(DbError::from)?;
    tracing::info!(site_id = id, by = actor.user_id, assets = paths.len(), "site deleted");

    state.media.remove_all(&paths).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct AdminsRequest {
    ids: Vec<i64>,
}

async fn replace_admins(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<AdminsRequest>,
) -> ApiResult<Json<Vec<UserSummaryView>>> {
    let mut conn = state.db.get().await?;
    site_by_id(&conn, id).await?.ok_or(ApiError::NotFound)?;

    let tx = conn.transaction().await.map_err(DbError::from)?;
    replace_site_admins(&tx, id, &body.ids).await?;
    tx.commit().await.map_err(DbError::from)?;
    tracing::info!(site_id = id, by = actor.user_id, admins = body.ids.len(), "site admins replaced");

    let admins = site_admins(&conn, id).await?;
    Ok(Json(admins.into_iter().map(Into::into).collect()))
}

async fn summaries(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<Vec<SiteSummaryView>>> {
    let conn = state.db.get().await?;
    let sites = managed_sites(&conn, &actor).await?;
    let mut views = Vec::with_capacity(sites.len());
    for site in sites {
        views.push(SiteSummaryView::load(&conn, &state.media, site).await?);
    }
    Ok(Json(views))
}

/// Current weather at the site, or the default reading when it cannot be had.
async fn site_weather(state: &AppState, latitude: f64, longitude: f64) -> Weather {
    match state.weather.current(latitude, longitude).await {
        Ok(weather) => weather,
        Err(e) => {
            tracing::warn!(latitude, longitude, error = %e, "weather unavailable");
            Weather::default()
        }
    }
}

async fn summary_detail(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SiteSummaryDetailView>> {
    let conn = state.db.get().await?;
    let site = managed_site(&conn, &actor, id).await?;

    let weather = match site.coordinate_id {
        Some(coordinate_id) => match coordinate_by_id(&conn, coordinate_id).await? {
            Some(c) => site_weather(&state, c.dd_latitude, c.dd_longitude).await,
            None => Weather::default(),
        },
        None => Weather::default(),
    };
    let mut sponsors = Vec::new();
    for sponsor in site_sponsors(&conn, site.id).await? {
        sponsors.push(SponsorView::load(&conn, &state.media, sponsor).await?);
    }
    let summary = SiteSummaryView::load(&conn, &state.media, site).await?;

    Ok(Json(SiteSummaryDetailView {
        summary,
        sponsors,
        weather,
    }))
}

async fn map(State(state): State<AppState>) -> ApiResult<Json<Vec<SiteMapView>>> {
    let conn = state.db.get().await?;
    let mut pins = Vec::new();
    for site in map_sites(&conn).await? {
        if let Some(pin) = SiteMapView::load(&conn, &state.media, site).await? {
            pins.push(pin);
        }
    }
    Ok(Json(pins))
}
