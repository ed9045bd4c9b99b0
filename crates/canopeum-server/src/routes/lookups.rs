use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::ACCEPT_LANGUAGE;
use axum::routing::{MethodRouter, get};
use axum::{Json, Router};
use canopeum::{Language, Translation};
use canopeum_db::queries::lookup::{LookupTable, list};

use crate::error::ApiResult;
use crate::state::AppState;
use crate::views::LookupView;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/tree-species", lookup(LookupTable::TreeType))
        .route("/analytics/site-types", lookup(LookupTable::SiteType))
        .route("/analytics/fertilizer-types", lookup(LookupTable::FertilizerType))
        .route("/analytics/mulch-layer-types", lookup(LookupTable::MulchLayerType))
}

fn lookup(table: LookupTable) -> MethodRouter<AppState> {
    get(move |State(state): State<AppState>, headers: HeaderMap| list_sorted(state, headers, table))
}

/// Entries sorted by their name in the caller's language.
async fn list_sorted(state: AppState, headers: HeaderMap, table: LookupTable) -> ApiResult<Json<Vec<LookupView>>> {
    let language = headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .map(Language::from_accept_language)
        .unwrap_or_default();

    let conn = state.db.get().await?;
    let mut items: Vec<(Translation, LookupView)> = list(&conn, table)
        .await?
        .into_iter()
        .map(|item| (Translation::new(item.en.clone(), item.fr.clone()), item.into()))
        .collect();
    items.sort_by(|(a, _), (b, _)| a.get(language).to_lowercase().cmp(&b.get(language).to_lowercase()));
    Ok(Json(items.into_iter().map(|(_, view)| view).collect()))
}
