//! Mapping Postgres rows into `Facet` structs.
//!
//! Fields are matched to columns by name (or by `#[facet(rename = "...")]`).
//! A field whose column is absent from the row gets its default value, so a
//! struct can be reused for queries that select a subset of columns.

use facet_core::{Facet, Shape, StructKind, Type, UserType};
use facet_reflect::Partial;
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

use crate::RowError;

type Result<T> = std::result::Result<T, RowError>;

/// Map a row into `T`.
///
/// ```ignore
/// #[derive(Facet)]
/// struct SiteName {
///     id: i64,
///     name: String,
/// }
///
/// let row = conn.traced().query_one("SELECT id, name FROM site WHERE id = $1", &[&id]).await?;
/// let site: SiteName = from_row(&row)?;
/// ```
pub fn from_row<T: Facet<'static>>(row: &Row) -> Result<T> {
    let partial = Partial::alloc_owned::<T>()?;
    let partial = fill_struct(row, partial, T::SHAPE)?;
    let heap_value = partial.build()?;
    Ok(heap_value.materialize()?)
}

fn fill_struct(
    row: &Row,
    mut partial: Partial<'static, false>,
    shape: &'static Shape,
) -> Result<Partial<'static, false>> {
    let struct_def = match &shape.ty {
        Type::User(UserType::Struct(s)) if s.kind == StructKind::Struct => s,
        _ => return Err(RowError::NotAStruct(shape)),
    };

    for (idx, field) in struct_def.fields.iter().enumerate() {
        let column = field.rename.unwrap_or(field.name);
        let Some(column_idx) = row.columns().iter().position(|c| c.name() == column) else {
            partial = partial
                .set_nth_field_to_default(idx)
                .map_err(|_| RowError::MissingColumn {
                    column: column.to_string(),
                })?;
            continue;
        };

        partial = partial.begin_field(field.name)?;
        partial = fill_column(row, column_idx, column, partial, field.shape())?;
        partial = partial.end()?;
    }

    Ok(partial)
}

/// Read one column as `V`, tagging failures with the column name.
fn get<'r, V: FromSql<'r>>(
    row: &'r Row,
    idx: usize,
    column: &str,
    expected: &'static Shape,
) -> Result<V> {
    row.try_get(idx).map_err(|source| RowError::TypeMismatch {
        column: column.to_string(),
        expected,
        source,
    })
}

fn fill_column(
    row: &Row,
    idx: usize,
    column: &str,
    mut partial: Partial<'static, false>,
    shape: &'static Shape,
) -> Result<Partial<'static, false>> {
    if shape.decl_id == Option::<()>::SHAPE.decl_id {
        return fill_optional_column(row, idx, column, partial, shape);
    }

    macro_rules! column_types {
        ($($t:ty),* $(,)?) => {
            $(
                if shape == <$t>::SHAPE {
                    let value: $t = get(row, idx, column, shape)?;
                    partial = partial.set(value)?;
                    return Ok(partial);
                }
            )*
        };
    }

    column_types!(
        i16,
        i32,
        i64,
        f64,
        bool,
        String,
        jiff::Timestamp,
        Vec<i64>,
        Vec<String>,
    );

    Err(RowError::UnsupportedType {
        field: column.to_string(),
        shape,
    })
}

fn fill_optional_column(
    row: &Row,
    idx: usize,
    column: &str,
    mut partial: Partial<'static, false>,
    shape: &'static Shape,
) -> Result<Partial<'static, false>> {
    let Some(inner) = shape.inner else {
        return Err(RowError::UnsupportedType {
            field: column.to_string(),
            shape,
        });
    };

    macro_rules! optional_column_types {
        ($($t:ty),* $(,)?) => {
            $(
                if inner == <$t>::SHAPE {
                    let value: Option<$t> = get(row, idx, column, shape)?;
                    partial = match value {
                        Some(value) => partial.begin_some()?.set(value)?.end()?,
                        None => partial.set_default()?,
                    };
                    return Ok(partial);
                }
            )*
        };
    }

    optional_column_types!(i16, i32, i64, f64, bool, String, jiff::Timestamp);

    Err(RowError::UnsupportedType {
        field: column.to_string(),
        shape,
    })
}
