//! Postgres persistence for Canopeum.
//!
//! # Naming Convention
//!
//! **Table names use singular form** (`site`, `batch`, `post`), and junction
//! tables join singular names with an underscore (`site_admin`,
//! `batch_fertilizer`, `post_like`). `user` is a reserved word in Postgres and
//! is always quoted.
//!
//! # Migrations
//!
//! Migrations are plain Rust functions registered with `inventory` from the
//! `migrations` module, one file per migration, named after their version:
//!
//! ```ignore
//! // In file: src/migrations/m2024_03_20_000000_initial.rs
//! fn run<'a>(ctx: &'a mut MigrationContext<'a>) -> BoxedMigration<'a> {
//!     Box::pin(async move {
//!         ctx.execute("CREATE TABLE site (id BIGSERIAL PRIMARY KEY)").await?;
//!         Ok(())
//!     })
//! }
//!
//! inventory::submit!(Migration::new("2024_03_20_000000", "initial", run));
//! ```
//!
//! The `?` operator turns a `tokio_postgres::Error` into a [`MigrationError`]
//! that remembers the file, line and column it came from.
//!
//! Run them with [`MigrationRunner`]:
//!
//! ```ignore
//! let mut runner = MigrationRunner::new(&mut client);
//! runner.migrate().await?;
//! ```
//!
//! # Queries
//!
//! Query functions live in [`queries`] and take any [`Connection`]: a plain
//! client, a pooled connection or a transaction. Rows are mapped into
//! `Facet` structs with [`from_row`].

use std::future::Future;
use std::pin::Pin;

mod error;
mod migrate;
mod migrations;
mod pool;
mod row;
mod traced;

pub mod model;
pub mod queries;
pub mod seed;

pub use error::{DbError, MigrationError, RegistrationError, RowError};
pub use migrate::{AppliedMigration, Migration, MigrationContext, MigrationRunner, MigrationStatus};
pub use pool::{Database, mask_password};
pub use row::from_row;
pub use traced::{Connection, ConnectionExt, TracedConn};

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DbError>;

/// Result type for migration functions, captures caller location on error.
pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

/// Future returned by a migration function.
pub type BoxedMigration<'a> = Pin<Box<dyn Future<Output = MigrationResult<()>> + Send + 'a>>;

/// Type alias for migration functions.
pub type MigrationFn = for<'a> fn(&'a mut MigrationContext<'a>) -> BoxedMigration<'a>;

inventory::collect!(Migration);
