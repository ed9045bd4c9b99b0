//! Bilingual lookup tables.

use crate::model::LookupItem;
use crate::{Connection, ConnectionExt, Result, from_row};

use super::{map_opt, map_rows};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupTable {
    TreeType,
    SiteType,
    FertilizerType,
    MulchLayerType,
}

impl LookupTable {
    pub const ALL: [LookupTable; 4] = [
        LookupTable::TreeType,
        LookupTable::SiteType,
        LookupTable::FertilizerType,
        LookupTable::MulchLayerType,
    ];

    pub fn table(self) -> &'static str {
        match self {
            LookupTable::TreeType => "tree_type",
            LookupTable::SiteType => "site_type",
            LookupTable::FertilizerType => "fertilizer_type",
            LookupTable::MulchLayerType => "mulch_layer_type",
        }
    }
}

/// Every entry of a lookup table, by id.
pub async fn list(conn: &impl Connection, table: LookupTable) -> Result<Vec<LookupItem>> {
    let sql = format!(
        "SELECT t.id, i.en, i.fr FROM {} t
         JOIN internationalization i ON i.id = t.name_id
         ORDER BY t.id",
        table.table()
    );
    let rows = conn.traced().query(&sql, &[]).await?;
    map_rows(&rows)
}

pub async fn find(conn: &impl Connection, table: LookupTable, id: i64) -> Result<Option<LookupItem>> {
    let sql = format!(
        "SELECT t.id, i.en, i.fr FROM {} t
         JOIN internationalization i ON i.id = t.name_id
         WHERE t.id = $1",
        table.table()
    );
    let row = conn.traced().query_opt(&sql, &[&id]).await?;
    map_opt(row)
}

/// Insert an entry with its English and French names.
pub async fn insert(
    conn: &impl Connection,
    table: LookupTable,
    en: &str,
    fr: &str,
) -> Result<LookupItem> {
    let sql = format!(
        "WITH name AS (
            INSERT INTO internationalization (en, fr) VALUES ($1, $2) RETURNING id, en, fr
         )
         INSERT INTO {} (name_id) SELECT id FROM name
         RETURNING id, (SELECT en FROM name) AS en, (SELECT fr FROM name) AS fr",
        table.table()
    );
    let row = conn.traced().query_one(&sql, &[&en, &fr]).await?;
    Ok(from_row(&row)?)
}
