use crate::model::Asset;
use crate::{Connection, ConnectionExt, Result, from_row};

use super::{map_opt, map_rows};

pub async fn insert_asset(conn: &impl Connection, path: &str) -> Result<Asset> {
    let row = conn
        .traced()
        .query_one(
            "INSERT INTO asset (path) VALUES ($1) RETURNING id, path, created_at",
            &[&path],
        )
        .await?;
    Ok(from_row(&row)?)
}

pub async fn asset_by_id(conn: &impl Connection, id: i64) -> Result<Option<Asset>> {
    let row = conn
        .traced()
        .query_opt("SELECT id, path, created_at FROM asset WHERE id = $1", &[&id])
        .await?;
    map_opt(row)
}

pub async fn assets_by_ids(conn: &impl Connection, ids: &[i64]) -> Result<Vec<Asset>> {
    let rows = conn
        .traced()
        .query(
            "SELECT id, path, created_at FROM asset WHERE id = ANY($1) ORDER BY id",
            &[&ids],
        )
        .await?;
    map_rows(&rows)
}

/// Delete asset rows, returning the paths of the files they pointed at.
pub async fn delete_assets(conn: &impl Connection, ids: &[i64]) -> Result<Vec<String>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = conn
        .traced()
        .query("DELETE FROM asset WHERE id = ANY($1) RETURNING path", &[&ids])
        .await?;
    super::column(&rows, "path")
}
