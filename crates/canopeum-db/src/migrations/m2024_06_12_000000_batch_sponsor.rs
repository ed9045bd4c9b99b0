//! Free-text `batch.sponsor` becomes a `batch_sponsor` row owned by the batch.

use crate::{BoxedMigration, Migration, MigrationContext};

fn run<'a>(ctx: &'a mut MigrationContext<'a>) -> BoxedMigration<'a> {
    Box::pin(async move {
        ctx.execute(
            "CREATE TABLE batch_sponsor (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT,
                logo_id BIGINT REFERENCES asset (id),
                legacy_batch_id BIGINT
            )",
        )
        .await?;

        ctx.execute(
            "INSERT INTO batch_sponsor (name, legacy_batch_id)
             SELECT sponsor, id FROM batch
             WHERE sponsor IS NOT NULL AND btrim(sponsor) <> ''",
        )
        .await?;

        ctx.execute(
            "ALTER TABLE batch
             ADD COLUMN sponsor_id BIGINT UNIQUE REFERENCES batch_sponsor (id)",
        )
        .await?;

        ctx.execute(
            "UPDATE batch SET sponsor_id = s.id
             FROM batch_sponsor s
             WHERE s.legacy_batch_id = batch.id",
        )
        .await?;

        ctx.execute("ALTER TABLE batch_sponsor DROP COLUMN legacy_batch_id")
            .await?;
        ctx.execute("ALTER TABLE batch DROP COLUMN sponsor").await?;
        Ok(())
    })
}

inventory::submit!(Migration::new("2024_06_12_000000", "batch_sponsor", run));
