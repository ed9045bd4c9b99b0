//! Batches, their sponsors and their composition.
//!
//! Composition rows are unique per (batch, reference). Adding the same
//! reference twice fails with [`DbError::UniqueViolation`](crate::DbError)
//! naming one of the `*_unique` constraints.

use crate::model::{Batch, BatchSponsor, LookupItem, SpeciesQuantity};
use crate::queries::asset::delete_assets;
use crate::{Connection, ConnectionExt, Result, from_row};

use super::{column, map_opt, map_rows};

/// Tables holding one row per (batch, reference).
pub(crate) const COMPOSITION_TABLES: [&str; 5] = [
    "batch_species",
    "batch_seed",
    "batch_fertilizer",
    "batch_mulch_layer",
    "batch_supported_species",
];

/// True for the `{table}_unique` constraint of a composition table.
pub fn is_composition_constraint(constraint: &str) -> bool {
    constraint
        .strip_suffix("_unique")
        .is_some_and(|table| COMPOSITION_TABLES.contains(&table))
}

const BATCH_COLUMNS: &str = "id, site_id, name, sponsor_id, size, soil_condition, survived_count, \
     replace_count, total_propagation, image_id, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct SponsorInput {
    pub name: String,
    pub url: Option<String>,
    pub logo_id: Option<i64>,
}

/// The reference sets of a batch. On update, `None` keeps the current set.
#[derive(Debug, Clone, Default)]
pub struct Composition {
    pub fertilizer_ids: Option<Vec<i64>>,
    pub mulch_layer_ids: Option<Vec<i64>>,
    pub supported_species_ids: Option<Vec<i64>>,
    /// `(tree_type_id, quantity)` pairs.
    pub species: Option<Vec<(i64, i32)>>,
    /// `(tree_type_id, quantity)` pairs.
    pub seeds: Option<Vec<(i64, i32)>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewBatch {
    pub site_id: i64,
    pub name: String,
    pub sponsor: Option<SponsorInput>,
    pub size: Option<i32>,
    pub soil_condition: Option<String>,
    pub survived_count: Option<i32>,
    pub replace_count: Option<i32>,
    pub total_propagation: Option<i32>,
    pub image_id: Option<i64>,
    pub composition: Composition,
}

/// Partial batch update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct BatchUpdate {
    pub name: Option<String>,
    pub sponsor: Option<SponsorInput>,
    pub size: Option<i32>,
    pub soil_condition: Option<String>,
    pub survived_count: Option<i32>,
    pub replace_count: Option<i32>,
    pub total_propagation: Option<i32>,
    pub image_id: Option<i64>,
    pub composition: Composition,
}

/// Everything attached to a batch, with bilingual names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchComposition {
    pub fertilizers: Vec<LookupItem>,
    pub mulch_layers: Vec<LookupItem>,
    pub supported_species: Vec<LookupItem>,
    pub species: Vec<SpeciesQuantity>,
    pub seeds: Vec<SpeciesQuantity>,
}

async fn insert_sponsor(conn: &impl Connection, sponsor: &SponsorInput) -> Result<BatchSponsor> {
    let row = conn
        .traced()
        .query_one(
            "INSERT INTO batch_sponsor (name, url, logo_id) VALUES ($1, $2, $3)
             RETURNING id, name, url, logo_id",
            &[&sponsor.name, &sponsor.url, &sponsor.logo_id],
        )
        .await?;
    Ok(from_row(&row)?)
}

/// Create a batch with its sponsor and composition. Run inside a transaction.
pub async fn insert_batch(conn: &impl Connection, new: &NewBatch) -> Result<Batch> {
    let sponsor_id = match &new.sponsor {
        Some(sponsor) => Some(insert_sponsor(conn, sponsor).await?.id),
        None => None,
    };

    let sql = format!(
        "INSERT INTO batch (site_id, name, sponsor_id, size, soil_condition, survived_count,
            replace_count, total_propagation, image_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {BATCH_COLUMNS}"
    );
    let row = conn
        .traced()
        .query_one(
            &sql,
            &[
                &new.site_id,
                &new.name,
                &sponsor_id,
                &new.size,
                &new.soil_condition,
                &new.survived_count,
                &new.replace_count,
                &new.total_propagation,
                &new.image_id,
            ],
        )
        .await?;
    let batch: Batch = from_row(&row)?;

    replace_composition(conn, batch.id, &new.composition).await?;
    tracing::info!(batch_id = batch.id, site_id = batch.site_id, "created batch");
    Ok(batch)
}

/// Update a batch. A given sponsor replaces the fields of the current one, or
/// is created if the batch has none. Run inside a transaction.
pub async fn update_batch(conn: &impl Connection, id: i64, update: &BatchUpdate) -> Result<Option<Batch>> {
    let Some(current) = batch_by_id(conn, id).await? else {
        return Ok(None);
    };

    let sponsor_id = match (&update.sponsor, current.sponsor_id) {
        (Some(sponsor), Some(sponsor_id)) => {
            conn.traced()
                .execute(
                    "UPDATE batch_sponsor SET name = $2, url = $3, logo_id = COALESCE($4, logo_id)
                     WHERE id = $1",
                    &[&sponsor_id, &sponsor.name, &sponsor.url, &sponsor.logo_id],
                )
                .await?;
            Some(sponsor_id)
        }
        (Some(sponsor), None) => Some(insert_sponsor(conn, sponsor).await?.id),
        (None, current) => current,
    };

    let sql = format!(
        "UPDATE batch SET
            name = COALESCE($2, name),
            sponsor_id = $3,
            size = COALESCE($4, size),
            soil_condition = COALESCE($5, soil_condition),
            survived_count = COALESCE($6, survived_count),
            replace_count = COALESCE($7, replace_count),
            total_propagation = COALESCE($8, total_propagation),
            image_id = COALESCE($9, image_id),
            updated_at = now()
         WHERE id = $1
         RETURNING {BATCH_COLUMNS}"
    );
    let row = conn
        .traced()
        .query_one(
            &sql,
            &[
                &id,
                &update.name,
                &sponsor_id,
                &update.size,
                &update.soil_condition,
                &update.survived_count,
                &update.replace_count,
                &update.total_propagation,
                &update.image_id,
            ],
        )
        .await?;

    replace_composition(conn, id, &update.composition).await?;
    Ok(Some(from_row(&row)?))
}

pub async fn batch_by_id(conn: &impl Connection, id: i64) -> Result<Option<Batch>> {
    let sql = format!("SELECT {BATCH_COLUMNS} FROM batch WHERE id = $1");
    let row = conn.traced().query_opt(&sql, &[&id]).await?;
    map_opt(row)
}

/// Batches of the given sites, most recently updated first.
pub async fn batches_for_sites(conn: &impl Connection, site_ids: &[i64]) -> Result<Vec<Batch>> {
    let sql = format!(
        "SELECT {BATCH_COLUMNS} FROM batch WHERE site_id = ANY($1) ORDER BY updated_at DESC, id DESC"
    );
    let rows = conn.traced().query(&sql, &[&site_ids]).await?;
    map_rows(&rows)
}

pub async fn batches_for_site(conn: &impl Connection, site_id: i64) -> Result<Vec<Batch>> {
    batches_for_sites(conn, &[site_id]).await
}

pub async fn sponsor_by_id(conn: &impl Connection, id: i64) -> Result<Option<BatchSponsor>> {
    let row = conn
        .traced()
        .query_opt(
            "SELECT id, name, url, logo_id FROM batch_sponsor WHERE id = $1",
            &[&id],
        )
        .await?;
    map_opt(row)
}

pub async fn add_fertilizer(conn: &impl Connection, batch_id: i64, fertilizer_type_id: i64) -> Result<()> {
    conn.traced()
        .execute(
            "INSERT INTO batch_fertilizer (batch_id, fertilizer_type_id) VALUES ($1, $2)",
            &[&batch_id, &fertilizer_type_id],
        )
        .await?;
    Ok(())
}

pub async fn add_mulch_layer(conn: &impl Connection, batch_id: i64, mulch_layer_type_id: i64) -> Result<()> {
    conn.traced()
        .execute(
            "INSERT INTO batch_mulch_layer (batch_id, mulch_layer_type_id) VALUES ($1, $2)",
            &[&batch_id, &mulch_layer_type_id],
        )
        .await?;
    Ok(())
}

pub async fn add_supported_species(conn: &impl Connection, batch_id: i64, tree_type_id: i64) -> Result<()> {
    conn.traced()
        .execute(
            "INSERT INTO batch_supported_species (batch_id, tree_type_id) VALUES ($1, $2)",
            &[&batch_id, &tree_type_id],
        )
        .await?;
    Ok(())
}

pub async fn add_species(
    conn: &impl Connection,
    batch_id: i64,
    tree_type_id: i64,
    quantity: i32,
) -> Result<()> {
    conn.traced()
        .execute(
            "INSERT INTO batch_species (batch_id, tree_type_id, quantity) VALUES ($1, $2, $3)",
            &[&batch_id, &tree_type_id, &quantity],
        )
        .await?;
    Ok(())
}

pub async fn add_seed(conn: &impl Connection, batch_id: i64, tree_type_id: i64, quantity: i32) -> Result<()> {
    conn.traced()
        .execute(
            "INSERT INTO batch_seed (batch_id, tree_type_id, quantity) VALUES ($1, $2, $3)",
            &[&batch_id, &tree_type_id, &quantity],
        )
        .await?;
    Ok(())
}

/// Replace each composition set that is `Some`.
pub async fn replace_composition(conn: &impl Connection, batch_id: i64, composition: &Composition) -> Result<()> {
    let db = conn.traced();
    if let Some(ids) = &composition.fertilizer_ids {
        db.execute("DELETE FROM batch_fertilizer WHERE batch_id = $1", &[&batch_id])
            .await?;
        for id in ids {
            add_fertilizer(conn, batch_id, *id).await?;
        }
    }
    if let Some(ids) = &composition.mulch_layer_ids {
        db.execute("DELETE FROM batch_mulch_layer WHERE batch_id = $1", &[&batch_id])
            .await?;
        for id in ids {
            add_mulch_layer(conn, batch_id, *id).await?;
        }
    }
    if let Some(ids) = &composition.supported_species_ids {
        db.execute(
            "DELETE FROM batch_supported_species WHERE batch_id = $1",
            &[&batch_id],
        )
        .await?;
        for id in ids {
            add_supported_species(conn, batch_id, *id).await?;
        }
    }
    if let Some(species) = &composition.species {
        db.execute("DELETE FROM batch_species WHERE batch_id = $1", &[&batch_id])
            .await?;
        for (id, quantity) in species {
            add_species(conn, batch_id, *id, *quantity).await?;
        }
    }
    if let Some(seeds) = &composition.seeds {
        db.execute("DELETE FROM batch_seed WHERE batch_id = $1", &[&batch_id])
            .await?;
        for (id, quantity) in seeds {
            add_seed(conn, batch_id, *id, *quantity).await?;
        }
    }
    Ok(())
}

async fn lookup_refs(
    conn: &impl Connection,
    junction: &str,
    column: &str,
    lookup: &str,
    batch_id: i64,
) -> Result<Vec<LookupItem>> {
    let sql = format!(
        "SELECT t.id, i.en, i.fr
         FROM {junction} j
         JOIN {lookup} t ON t.id = j.{column}
         JOIN internationalization i ON i.id = t.name_id
         WHERE j.batch_id = $1
         ORDER BY t.id"
    );
    let rows = conn.traced().query(&sql, &[&batch_id]).await?;
    map_rows(&rows)
}

async fn quantity_refs(conn: &impl Connection, junction: &str, batch_id: i64) -> Result<Vec<SpeciesQuantity>> {
    let sql = format!(
        "SELECT t.id, i.en, i.fr, j.quantity
         FROM {junction} j
         JOIN tree_type t ON t.id = j.tree_type_id
         JOIN internationalization i ON i.id = t.name_id
         WHERE j.batch_id = $1
         ORDER BY t.id"
    );
    let rows = conn.traced().query(&sql, &[&batch_id]).await?;
    map_rows(&rows)
}

pub async fn batch_composition(conn: &impl Connection, batch_id: i64) -> Result<BatchComposition> {
    Ok(BatchComposition {
        fertilizers: lookup_refs(
            conn,
            "batch_fertilizer",
            "fertilizer_type_id",
            "fertilizer_type",
            batch_id,
        )
        .await?,
        mulch_layers: lookup_refs(
            conn,
            "batch_mulch_layer",
            "mulch_layer_type_id",
            "mulch_layer_type",
            batch_id,
        )
        .await?,
        supported_species: lookup_refs(
            conn,
            "batch_supported_species",
            "tree_type_id",
            "tree_type",
            batch_id,
        )
        .await?,
        species: quantity_refs(conn, "batch_species", batch_id).await?,
        seeds: quantity_refs(conn, "batch_seed", batch_id).await?,
    })
}

/// Delete a batch with its composition and sponsor, returning the media paths
/// of the deleted assets. Run inside a transaction.
pub async fn delete_batch(conn: &impl Connection, id: i64) -> Result<Option<Vec<String>>> {
    let db = conn.traced();
    for table in COMPOSITION_TABLES {
        db.execute(&format!("DELETE FROM {table} WHERE batch_id = $1"), &[&id])
            .await?;
    }
    let Some(row) = db
        .query_opt(
            "DELETE FROM batch WHERE id = $1 RETURNING sponsor_id, image_id",
            &[&id],
        )
        .await?
    else {
        return Ok(None);
    };

    let mut asset_ids: Vec<i64> = Vec::new();
    asset_ids.extend(row.try_get::<_, Option<i64>>("image_id")?);
    if let Some(sponsor_id) = row.try_get::<_, Option<i64>>("sponsor_id")? {
        let rows = db
            .query(
                "DELETE FROM batch_sponsor WHERE id = $1 RETURNING logo_id",
                &[&sponsor_id],
            )
            .await?;
        asset_ids.extend(column::<Option<i64>>(&rows, "logo_id")?.into_iter().flatten());
    }

    let paths = delete_assets(conn, &asset_ids).await?;
    tracing::info!(batch_id = id, assets = paths.len(), "deleted batch");
    Ok(Some(paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn recognizes_composition_constraints() {
        assert!(is_composition_constraint("batch_fertilizer_unique"));
        assert!(is_composition_constraint("batch_supported_species_unique"));
        assert!(!is_composition_constraint("post_like_pkey"));
        assert!(!is_composition_constraint("batch_unique"));
        assert!(!is_composition_constraint("batch_fertilizer"));
    }
}
