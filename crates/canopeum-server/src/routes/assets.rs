use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use canopeum_db::queries::asset::insert_asset;
use jiff::Timestamp;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::views::AssetView;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/assets", post(upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::field("asset", e.body_text())
}

async fn upload(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<AssetView>)> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("asset") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        file = Some((file_name, bytes));
        break;
    }
    let Some((file_name, bytes)) = file else {
        return Err(ApiError::field("asset", "No file was submitted."));
    };

    let path = state
        .media
        .save(&file_name, &bytes, Timestamp::now())
        .await
        .map_err(ApiError::internal)?;

    let conn = match state.db.get().await {
        Ok(conn) => conn,
        Err(e) => {
            state.media.remove_all(std::slice::from_ref(&path)).await;
            return Err(e.into());
        }
    };
    let asset = match insert_asset(&conn, &path).await {
        Ok(asset) => asset,
        Err(e) => {
            state.media.remove_all(std::slice::from_ref(&path)).await;
            return Err(e.into());
        }
    };
    tracing::info!(asset_id = asset.id, %path, by = actor.user_id, "asset uploaded");

    Ok((
        StatusCode::CREATED,
        Json(AssetView::of(&asset, &state.media)),
    ))
}
