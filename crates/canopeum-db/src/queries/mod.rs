//! Query functions, grouped by aggregate.
//!
//! Every function takes `&impl Connection` (or a transaction when several
//! statements must commit together) and returns typed rows.

use facet::Facet;
use tokio_postgres::Row;

use crate::{Result, from_row};

pub mod asset;
pub mod batch;
pub mod lookup;
pub mod site;
pub mod social;
pub mod user;

fn map_rows<T: Facet<'static>>(rows: &[Row]) -> Result<Vec<T>> {
    rows.iter().map(|row| Ok(from_row(row)?)).collect()
}

fn map_opt<T: Facet<'static>>(row: Option<Row>) -> Result<Option<T>> {
    row.map(|row| from_row(&row)).transpose().map_err(Into::into)
}

/// One column of every row.
fn column<T>(rows: &[Row], name: &str) -> Result<Vec<T>>
where
    T: for<'r> tokio_postgres::types::FromSql<'r>,
{
    rows.iter()
        .map(|row| row.try_get(name).map_err(Into::into))
        .collect()
}
