use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use canopeum::Actor;
use canopeum_db::model::Batch;
use canopeum_db::queries::batch::{
    BatchUpdate, Composition, NewBatch, SponsorInput, add_fertilizer, add_mulch_layer, add_seed,
    add_species, add_supported_species, batch_by_id, batches_for_site, batches_for_sites,
    delete_batch as remove_batch, insert_batch, update_batch,
};
use canopeum_db::{Connection, DbError};
use serde::Deserialize;

use super::{
    JsonBody, QuantityInput, QueryParams, managed_site, managed_site_ids, quantities, required,
};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::state::AppState;
use crate::views::batch::BatchView;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/batches", get(list_batches).post(create_batch))
        .route(
            "/analytics/batches/:id",
            get(batch_detail).patch(patch_batch).delete(delete_batch),
        )
        .route("/analytics/batches/:id/fertilizers", post(attach_fertilizer))
        .route("/analytics/batches/:id/mulch-layers", post(attach_mulch_layer))
        .route(
            "/analytics/batches/:id/supported-species",
            post(attach_supported_species),
        )
        .route("/analytics/batches/:id/species", post(attach_species))
        .route("/analytics/batches/:id/seeds", post(attach_seed))
}

/// The batch, if the actor manages its site.
async fn managed_batch(conn: &impl Connection, actor: &Actor, id: i64) -> ApiResult<Batch> {
    let batch = batch_by_id(conn, id).await?.ok_or(ApiError::NotFound)?;
    managed_site(conn, actor, batch.site_id).await?;
    Ok(batch)
}

#[derive(Debug, Default, Deserialize)]
struct BatchFilter {
    #[serde(rename = "siteId")]
    site_id: Option<i64>,
}

async fn list_batches(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    QueryParams(filter): QueryParams<BatchFilter>,
) -> ApiResult<Json<Vec<BatchView>>> {
    let conn = state.db.get().await?;
    let batches = match filter.site_id {
        Some(site_id) => {
            managed_site(&conn, &actor, site_id).await?;
            batches_for_site(&conn, site_id).await?
        }
        None => {
            let site_ids = managed_site_ids(&conn, &actor).await?;
            batches_for_sites(&conn, &site_ids).await?
        }
    };
    Ok(Json(BatchView::load_all(&conn, &state.media, batches).await?))
}

#[derive(Debug, Clone, Deserialize)]
struct SponsorRequest {
    name: String,
    url: Option<String>,
    logo_id: Option<i64>,
}

impl From<SponsorRequest> for SponsorInput {
    fn from(s: SponsorRequest) -> Self {
        SponsorInput {
            name: s.name,
            url: s.url,
            logo_id: s.logo_id,
        }
    }
}

/// Reference sets as sent by clients. An absent list is left alone on update
/// and empty on create.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompositionRequest {
    fertilizer_ids: Option<Vec<i64>>,
    mulch_layer_ids: Option<Vec<i64>>,
    supported_species_ids: Option<Vec<i64>>,
    species: Option<Vec<QuantityInput>>,
    seeds: Option<Vec<QuantityInput>>,
}

impl CompositionRequest {
    fn into_composition(self) -> ApiResult<Composition> {
        Ok(Composition {
            species: self
                .species
                .as_deref()
                .map(|items| quantities("species", items))
                .transpose()?,
            seeds: self
                .seeds
                .as_deref()
                .map(|items| quantities("seeds", items))
                .transpose()?,
            fertilizer_ids: self.fertilizer_ids,
            mulch_layer_ids: self.mulch_layer_ids,
            supported_species_ids: self.supported_species_ids,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    site_id: i64,
    name: String,
    sponsor: Option<SponsorRequest>,
    size: Option<i32>,
    soil_condition: Option<String>,
    survived_count: Option<i32>,
    replace_count: Option<i32>,
    total_propagation: Option<i32>,
    image_id: Option<i64>,
    #[serde(flatten)]
    composition: CompositionRequest,
}

async fn create_batch(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<BatchRequest>,
) -> ApiResult<(StatusCode, Json<BatchView>)> {
    let mut errors = FieldErrors::new();
    required(&mut errors, "name", &body.name);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let mut conn = state.db.get().await?;
    managed_site(&conn, &actor, body.site_id).await?;

    let new = NewBatch {
        site_id: body.site_id,
        name: body.name,
        sponsor: body.sponsor.map(Into::into),
        size: body.size,
        soil_condition: body.soil_condition,
        survived_count: body.survived_count,
        replace_count: body.replace_count,
        total_propagation: body.total_propagation,
        image_id: body.image_id,
        composition: body.composition.into_composition()?,
    };
    let tx = conn.transaction().await.map_err(DbError::from)?;
    let batch = insert_batch(&tx, &new).await?;
    tx.commit().await.map_err(DbError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(BatchView::load(&conn, &state.media, batch).await?),
    ))
}

async fn batch_detail(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<BatchView>> {
    let conn = state.db.get().await?;
    let batch = managed_batch(&conn, &actor, id).await?;
    Ok(Json(BatchView::load(&conn, &state.media, batch).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BatchPatch {
    name: Option<String>,
    sponsor: Option<SponsorRequest>,
    size: Option<i32>,
    soil_condition: Option<String>,
    survived_count: Option<i32>,
    replace_count: Option<i32>,
    total_propagation: Option<i32>,
    image_id: Option<i64>,
    #[serde(flatten)]
    composition: CompositionRequest,
}

async fn patch_batch(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<BatchPatch>,
) -> ApiResult<Json<BatchView>> {
    if let Some(name) = &body.name {
        let mut errors = FieldErrors::new();
        required(&mut errors, "name", name);
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }
    }

    let mut conn = state.db.get().await?;
    managed_batch(&conn, &actor, id).await?;

    let update = BatchUpdate {
        name: body.name,
        sponsor: body.sponsor.map(Into::into),
        size: body.size,
        soil_condition: body.soil_condition,
        survived_count: body.survived_count,
        replace_count: body.replace_count,
        total_propagation: body.total_propagation,
        image_id: body.image_id,
        composition: body.composition.into_composition()?,
    };
    let tx = conn.transaction().await.map_err(DbError::from)?;
    let batch = update_batch(&tx, id, &update)
        .await?
        .ok_or(ApiError::NotFound)?;
    tx.commit().await.map_err(DbError::from)?;
    tracing::info!(batch_id = id, by = actor.user_id, "batch updated");

    Ok(Json(BatchView::load(&conn, &state.media, batch).await?))
}

async fn delete_batch(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut conn = state.db.get().await?;
    managed_batch(&conn, &actor, id).await?;

    let tx = conn.transaction().await.map_err(DbError::from)?;
    let paths = remove_batch(&tx, id).await?.ok_or(ApiError::NotFound)?;
    tx.commit().await.map_err(DbError::from)?;
    tracing::info!(batch_id = id, by = actor.user_id, "batch deleted");

    state.media.remove_all(&paths).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ReferenceRequest {
    id: i64,
}

async fn attach_fertilizer(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ReferenceRequest>,
) -> ApiResult<(StatusCode, Json<BatchView>)> {
    let conn = state.db.get().await?;
    let batch = managed_batch(&conn, &actor, id).await?;
    add_fertilizer(&conn, id, body.id).await?;
    Ok((StatusCode::CREATED, Json(BatchView::load(&conn, &state.media, batch).await?)))
}

async fn attach_mulch_layer(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ReferenceRequest>,
) -> ApiResult<(StatusCode, Json<BatchView>)> {
    let conn = state.db.get().await?;
    let batch = managed_batch(&conn, &actor, id).await?;
    add_mulch_layer(&conn, id, body.id).await?;
    Ok((StatusCode::CREATED, Json(BatchView::load(&conn, &state.media, batch).await?)))
}

async fn attach_supported_species(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ReferenceRequest>,
) -> ApiResult<(StatusCode, Json<BatchView>)> {
    let conn = state.db.get().await?;
    let batch = managed_batch(&conn, &actor, id).await?;
    add_supported_species(&conn, id, body.id).await?;
    Ok((StatusCode::CREATED, Json(BatchView::load(&conn, &state.media, batch).await?)))
}

async fn attach_species(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<QuantityInput>,
) -> ApiResult<(StatusCode, Json<BatchView>)> {
    quantities("quantity", &[body])?;
    let conn = state.db.get().await?;
    let batch = managed_batch(&conn, &actor, id).await?;
    add_species(&conn, id, body.id, body.quantity).await?;
    Ok((StatusCode::CREATED, Json(BatchView::load(&conn, &state.media, batch).await?)))
}

async fn attach_seed(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<QuantityInput>,
) -> ApiResult<(StatusCode, Json<BatchView>)> {
    quantities("quantity", &[body])?;
    let conn = state.db.get().await?;
    let batch = managed_batch(&conn, &actor, id).await?;
    add_seed(&conn, id, body.id, body.quantity).await?;
    Ok((StatusCode::CREATED, Json(BatchView::load(&conn, &state.media, batch).await?)))
}
