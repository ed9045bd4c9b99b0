use crate::{BoxedMigration, Migration, MigrationContext};

fn run<'a>(ctx: &'a mut MigrationContext<'a>) -> BoxedMigration<'a> {
    Box::pin(async move {
        ctx.execute(
            "CREATE TABLE user_invitation (
                id BIGSERIAL PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                expires_at TIMESTAMPTZ NOT NULL
            )",
        )
        .await?;
        ctx.execute(
            "CREATE TABLE user_invitation_site (
                invitation_id BIGINT NOT NULL REFERENCES user_invitation (id),
                site_id BIGINT NOT NULL REFERENCES site (id),
                PRIMARY KEY (invitation_id, site_id)
            )",
        )
        .await?;
        ctx.execute(
            "CREATE TABLE revoked_token (
                jti TEXT PRIMARY KEY,
                expires_at TIMESTAMPTZ NOT NULL
            )",
        )
        .await?;
        Ok(())
    })
}

inventory::submit!(Migration::new("2024_11_18_000000", "user_invitation", run));
