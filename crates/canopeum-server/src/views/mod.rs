//! JSON shapes returned by the API.
//!
//! Row types from `canopeum-db` stay free of serde; every response goes
//! through one of these views. Views that need related rows come with an
//! async builder taking the connection.

use std::collections::HashMap;

use canopeum_db::model::{Asset, LookupItem, SpeciesQuantity};
use canopeum_db::queries::asset::assets_by_ids;
use canopeum_db::{Connection, Result};
use serde::Serialize;

use crate::media::MediaStore;

pub mod batch;
pub mod site;
pub mod social;
pub mod user;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupView {
    pub id: i64,
    pub en: String,
    pub fr: String,
}

impl From<LookupItem> for LookupView {
    fn from(item: LookupItem) -> Self {
        LookupView {
            id: item.id,
            en: item.en,
            fr: item.fr,
        }
    }
}

/// An uploaded file and the URL it is served from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetView {
    pub id: i64,
    pub asset: String,
}

impl AssetView {
    pub fn new(id: i64, path: &str, media: &MediaStore) -> Self {
        AssetView {
            id,
            asset: media.url(path),
        }
    }

    pub fn of(asset: &Asset, media: &MediaStore) -> Self {
        AssetView::new(asset.id, &asset.path, media)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesView {
    pub id: i64,
    pub en: String,
    pub fr: String,
    pub quantity: i32,
}

impl From<SpeciesQuantity> for SpeciesView {
    fn from(species: SpeciesQuantity) -> Self {
        SpeciesView {
            id: species.id,
            en: species.en,
            fr: species.fr,
            quantity: species.quantity,
        }
    }
}

/// Asset views for a set of optional ids, fetched in one query.
pub async fn asset_views(
    conn: &impl Connection,
    media: &MediaStore,
    ids: impl IntoIterator<Item = Option<i64>>,
) -> Result<HashMap<i64, AssetView>> {
    let mut ids: Vec<i64> = ids.into_iter().flatten().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(assets_by_ids(conn, &ids)
        .await?
        .iter()
        .map(|asset| (asset.id, AssetView::of(asset, media)))
        .collect())
}

pub async fn asset_view(
    conn: &impl Connection,
    media: &MediaStore,
    id: Option<i64>,
) -> Result<Option<AssetView>> {
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(asset_views(conn, media, [Some(id)]).await?.remove(&id))
}
