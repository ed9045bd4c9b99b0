//! Running registered migrations.

use facet::Facet;
use jiff::Timestamp;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row, Transaction};
use tracing::{debug, info};

use crate::{ConnectionExt, DbError, MigrationFn, Result, from_row};

const MIGRATIONS_TABLE: &str = "_canopeum_migrations";

/// A migration registered with `inventory::submit!`.
pub struct Migration {
    /// Sortable version, `YYYY_MM_DD_HHMMSS`.
    pub version: &'static str,
    pub name: &'static str,
    pub run: MigrationFn,
}

impl Migration {
    pub const fn new(version: &'static str, name: &'static str, run: MigrationFn) -> Self {
        Migration { version, name, run }
    }

    /// Every registered migration, oldest first.
    pub fn all() -> Vec<&'static Migration> {
        let mut migrations: Vec<_> = inventory::iter::<Migration>.into_iter().collect();
        migrations.sort_by_key(|m| m.version);
        migrations
    }
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Handed to a migration function; every statement runs in the migration's
/// transaction.
pub struct MigrationContext<'a> {
    tx: &'a Transaction<'a>,
}

impl<'a> MigrationContext<'a> {
    pub fn new(tx: &'a Transaction<'a>) -> Self {
        MigrationContext { tx }
    }

    pub async fn execute(&self, sql: &str) -> std::result::Result<u64, tokio_postgres::Error> {
        self.tx.traced().execute(sql, &[]).await
    }

    pub async fn execute_with(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> std::result::Result<u64, tokio_postgres::Error> {
        self.tx.traced().execute(sql, params).await
    }

    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> std::result::Result<Vec<Row>, tokio_postgres::Error> {
        self.tx.traced().query(sql, params).await
    }
}

/// A row of the migrations table.
#[derive(Debug, Clone, Facet)]
pub struct AppliedMigration {
    pub version: String,
    pub name: String,
    pub applied_at: Timestamp,
}

/// Whether a known migration has been applied.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub version: &'static str,
    pub name: &'static str,
    pub applied_at: Option<Timestamp>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Applies pending migrations, each in its own transaction.
pub struct MigrationRunner<'c> {
    client: &'c mut Client,
}

impl<'c> MigrationRunner<'c> {
    pub fn new(client: &'c mut Client) -> Self {
        MigrationRunner { client }
    }

    async fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                version TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"
        );
        self.client.traced().execute(&sql, &[]).await?;
        Ok(())
    }

    /// Migrations recorded as applied, oldest first.
    pub async fn applied(&self) -> Result<Vec<AppliedMigration>> {
        self.ensure_table().await?;
        let sql =
            format!("SELECT version, name, applied_at FROM {MIGRATIONS_TABLE} ORDER BY version");
        let rows = self.client.traced().query(&sql, &[]).await?;
        rows.iter()
            .map(|row| from_row(row).map_err(DbError::from))
            .collect()
    }

    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        let applied = self.applied().await?;
        Ok(Migration::all()
            .into_iter()
            .map(|m| MigrationStatus {
                version: m.version,
                name: m.name,
                applied_at: applied
                    .iter()
                    .find(|a| a.version == m.version)
                    .map(|a| a.applied_at),
            })
            .collect())
    }

    /// Apply every pending migration, returning the ones that ran.
    pub async fn migrate(&mut self) -> Result<Vec<&'static Migration>> {
        let applied = self.applied().await?;
        let pending: Vec<_> = Migration::all()
            .into_iter()
            .filter(|m| !applied.iter().any(|a| a.version == m.version))
            .collect();

        if pending.is_empty() {
            debug!("no pending migrations");
            return Ok(pending);
        }

        let record = format!("INSERT INTO {MIGRATIONS_TABLE} (version, name) VALUES ($1, $2)");
        for migration in &pending {
            info!(version = migration.version, name = migration.name, "applying migration");
            let tx = self.client.transaction().await?;
            {
                let mut ctx = MigrationContext::new(&tx);
                (migration.run)(&mut ctx)
                    .await
                    .map_err(|source| DbError::Migration {
                        version: migration.version,
                        source,
                    })?;
            }
            tx.traced()
                .execute(&record, &[&migration.version, &migration.name])
                .await?;
            tx.commit().await?;
        }

        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn migrations_are_ordered_and_unique() {
        let all = Migration::all();
        assert!(!all.is_empty());
        for pair in all.windows(2) {
            assert!(
                pair[0].version < pair[1].version,
                "{} must sort before {}",
                pair[0].version,
                pair[1].version
            );
        }
    }

    #[test]
    fn versions_are_timestamps() {
        for migration in Migration::all() {
            let parts: Vec<_> = migration.version.split('_').collect();
            assert_eq!(parts.len(), 4, "{}", migration.version);
            assert!(
                parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())),
                "{}",
                migration.version
            );
        }
    }
}
