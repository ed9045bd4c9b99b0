//! Schema history, one file per migration.

mod m2024_03_20_000000_initial;
mod m2024_06_12_000000_batch_sponsor;
mod m2024_08_05_000000_post_like_unique;
mod m2024_10_01_000000_forest_steward_role;
mod m2024_11_18_000000_user_invitation;
mod m2025_02_10_000000_user_email_case_insensitive;
