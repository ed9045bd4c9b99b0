use canopeum::summary::plant_count;
use canopeum_db::model::{Batch, BatchSponsor};
use canopeum_db::queries::batch::{batch_composition, sponsor_by_id};
use canopeum_db::{Connection, Result};
use jiff::Timestamp;
use serde::Serialize;

use super::{AssetView, LookupView, SpeciesView, asset_view};
use crate::media::MediaStore;

#[derive(Debug, Clone, Serialize)]
pub struct SponsorView {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub logo: Option<AssetView>,
}

impl SponsorView {
    pub async fn load(conn: &impl Connection, media: &MediaStore, sponsor: BatchSponsor) -> Result<Self> {
        Ok(SponsorView {
            logo: asset_view(conn, media, sponsor.logo_id).await?,
            id: sponsor.id,
            name: sponsor.name,
            url: sponsor.url,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchView {
    pub id: i64,
    pub site_id: i64,
    pub name: String,
    pub sponsor: Option<SponsorView>,
    pub size: Option<i32>,
    pub soil_condition: Option<String>,
    pub survived_count: Option<i32>,
    pub replace_count: Option<i32>,
    pub total_propagation: Option<i32>,
    pub image: Option<AssetView>,
    pub fertilizers: Vec<LookupView>,
    pub mulch_layers: Vec<LookupView>,
    pub supported_species: Vec<LookupView>,
    pub species: Vec<SpeciesView>,
    pub seeds: Vec<SpeciesView>,
    pub total_number_seeds: i64,
    pub plant_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BatchView {
    pub async fn load(conn: &impl Connection, media: &MediaStore, batch: Batch) -> Result<Self> {
        let composition = batch_composition(conn, batch.id).await?;
        let sponsor = match batch.sponsor_id {
            Some(id) => match sponsor_by_id(conn, id).await? {
                Some(sponsor) => Some(SponsorView::load(conn, media, sponsor).await?),
                None => None,
            },
            None => None,
        };

        Ok(BatchView {
            id: batch.id,
            site_id: batch.site_id,
            name: batch.name,
            sponsor,
            size: batch.size,
            soil_condition: batch.soil_condition,
            survived_count: batch.survived_count,
            replace_count: batch.replace_count,
            total_propagation: batch.total_propagation,
            image: asset_view(conn, media, batch.image_id).await?,
            total_number_seeds: plant_count(composition.seeds.iter().map(|s| s.quantity)),
            plant_count: plant_count(composition.species.iter().map(|s| s.quantity)),
            fertilizers: composition.fertilizers.into_iter().map(Into::into).collect(),
            mulch_layers: composition.mulch_layers.into_iter().map(Into::into).collect(),
            supported_species: composition
                .supported_species
                .into_iter()
                .map(Into::into)
                .collect(),
            species: composition.species.into_iter().map(Into::into).collect(),
            seeds: composition.seeds.into_iter().map(Into::into).collect(),
            created_at: batch.created_at,
            updated_at: batch.updated_at,
        })
    }

    pub async fn load_all(conn: &impl Connection, media: &MediaStore, batches: Vec<Batch>) -> Result<Vec<Self>> {
        let mut views = Vec::with_capacity(batches.len());
        for batch in batches {
            views.push(BatchView::load(conn, media, batch).await?);
        }
        Ok(views)
    }
}
