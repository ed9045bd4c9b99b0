//! Historical role names collapse into `ForestSteward`, then the role column
//! only accepts current names.

use canopeum::Role;

use crate::{BoxedMigration, Migration, MigrationContext};

fn run<'a>(ctx: &'a mut MigrationContext<'a>) -> BoxedMigration<'a> {
    Box::pin(async move {
        let legacy: Vec<String> = Role::ForestSteward
            .legacy_aliases()
            .iter()
            .map(|alias| alias.to_string())
            .collect();
        ctx.execute_with(
            "UPDATE \"user\" SET role = $1 WHERE role = ANY($2)",
            &[&Role::ForestSteward.as_str(), &legacy],
        )
        .await?;

        let allowed = Role::ALL
            .iter()
            .map(|role| format!("'{}'", role.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        ctx.execute(&format!(
            "ALTER TABLE \"user\" ADD CONSTRAINT user_role_check CHECK (role IN ({allowed}))"
        ))
        .await?;
        Ok(())
    })
}

inventory::submit!(Migration::new("2024_10_01_000000", "forest_steward_role", run));
