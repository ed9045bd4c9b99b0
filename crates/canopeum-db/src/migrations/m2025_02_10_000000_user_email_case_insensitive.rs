//! Emails are unique regardless of case, matching how login looks them up.

use crate::{BoxedMigration, Migration, MigrationContext};

fn run<'a>(ctx: &'a mut MigrationContext<'a>) -> BoxedMigration<'a> {
    Box::pin(async move {
        ctx.execute("ALTER TABLE \"user\" DROP CONSTRAINT user_email_key")
            .await?;
        ctx.execute("CREATE UNIQUE INDEX user_email_lower_key ON \"user\" (lower(email))")
            .await?;
        Ok(())
    })
}

inventory::submit!(Migration::new("2025_02_10_000000", "user_email_case_insensitive", run));
