//! One like per user and post. Duplicates are removed first, keeping the oldest.

use crate::{BoxedMigration, Migration, MigrationContext};

fn run<'a>(ctx: &'a mut MigrationContext<'a>) -> BoxedMigration<'a> {
    Box::pin(async move {
        ctx.execute(
            "DELETE FROM post_like l
             USING post_like keep
             WHERE l.post_id = keep.post_id
               AND l.user_id = keep.user_id
               AND l.id > keep.id",
        )
        .await?;
        ctx.execute("ALTER TABLE post_like DROP COLUMN id").await?;
        ctx.execute("ALTER TABLE post_like ADD PRIMARY KEY (user_id, post_id)")
            .await?;
        ctx.execute("CREATE INDEX post_like_post_id_idx ON post_like (post_id)")
            .await?;
        Ok(())
    })
}

inventory::submit!(Migration::new("2024_08_05_000000", "post_like_unique", run));
