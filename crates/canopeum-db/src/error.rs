use std::fmt;
use std::panic::Location;

use canopeum::InvitationError;
use facet_core::Shape;
use facet_reflect::{AllocError, ReflectError, ShapeMismatchError};
use thiserror::Error;
use tokio_postgres::error::SqlState;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("postgres error: {0}")]
    Postgres(#[source] tokio_postgres::Error),

    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint {constraint} violated")]
    ForeignKeyViolation { constraint: String },

    #[error("failed to get a pooled connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("failed to build connection pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("failed to map row: {0}")]
    Row(#[from] RowError),

    #[error("invalid value in column {column}: {message}")]
    InvalidValue {
        column: &'static str,
        message: String,
    },

    #[error("migration {version} failed: {source}")]
    Migration {
        version: &'static str,
        #[source]
        source: MigrationError,
    },
}

impl DbError {
    /// True if this is a unique violation on the named constraint.
    pub fn is_unique_violation(&self, name: &str) -> bool {
        matches!(self, DbError::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<tokio_postgres::Error> for DbError {
    fn from(e: tokio_postgres::Error) -> Self {
        if let Some(db) = e.as_db_error() {
            let constraint = db.constraint().unwrap_or_default().to_string();
            if *db.code() == SqlState::UNIQUE_VIOLATION {
                return DbError::UniqueViolation { constraint };
            }
            if *db.code() == SqlState::FOREIGN_KEY_VIOLATION {
                return DbError::ForeignKeyViolation { constraint };
            }
        }
        DbError::Postgres(e)
    }
}

/// A failed statement inside a migration, with the location of the `?` that
/// propagated it.
#[derive(Debug)]
pub struct MigrationError {
    pub source: tokio_postgres::Error,
    pub location: &'static Location<'static>,
}

impl From<tokio_postgres::Error> for MigrationError {
    #[track_caller]
    fn from(source: tokio_postgres::Error) -> Self {
        MigrationError {
            source,
            location: Location::caller(),
        }
    }
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source.as_db_error() {
            Some(db) => write!(f, "{}", db.message())?,
            None => write!(f, "{}", self.source)?,
        }
        write!(
            f,
            " (at {}:{}:{})",
            self.location.file(),
            self.location.line(),
            self.location.column()
        )
    }
}

impl std::error::Error for MigrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Error mapping a Postgres row into a `Facet` struct.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("missing column: {column}")]
    MissingColumn { column: String },

    #[error("type mismatch for column '{column}': expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static Shape,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("cannot map a row into non-struct type {0}")]
    NotAStruct(&'static Shape),

    #[error("unsupported type for field '{field}': {shape}")]
    UnsupportedType {
        field: String,
        shape: &'static Shape,
    },

    #[error("reflection error: {0}")]
    Reflect(#[from] ReflectError),

    #[error("allocation error: {0}")]
    Alloc(#[from] AllocError),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(#[from] ShapeMismatchError),
}

/// Why a registration did not go through.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Invitation(#[from] InvitationError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<tokio_postgres::Error> for RegistrationError {
    fn from(e: tokio_postgres::Error) -> Self {
        RegistrationError::Db(e.into())
    }
}
