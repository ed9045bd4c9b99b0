//! Users, invitations and revoked refresh tokens.

use canopeum::{InvitationError, Role, invitation};
use jiff::Timestamp;

use crate::model::{StewardSites, User, UserInvitation};
use crate::{Connection, ConnectionExt, RegistrationError, Result, from_row};

use super::{column, map_opt, map_rows};

/// Index violated by a second account with the same email, in any case.
pub const EMAIL_UNIQUE: &str = "user_email_lower_key";
/// Constraint violated by a second account with the same username.
pub const USERNAME_UNIQUE: &str = "user_username_key";

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, last_login_at";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial user update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

pub async fn insert_user(conn: &impl Connection, new: &NewUser) -> Result<User> {
    let sql = format!(
        "INSERT INTO \"user\" (username, email, password_hash, role) VALUES ($1, $2, $3, $4)
         RETURNING {USER_COLUMNS}"
    );
    let row = conn
        .traced()
        .query_one(
            &sql,
            &[
                &new.username,
                &new.email,
                &new.password_hash,
                &new.role.as_str(),
            ],
        )
        .await?;
    Ok(from_row(&row)?)
}

pub async fn user_by_id(conn: &impl Connection, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM \"user\" WHERE id = $1");
    let row = conn.traced().query_opt(&sql, &[&id]).await?;
    map_opt(row)
}

/// Case-insensitive lookup by email.
pub async fn user_by_email(conn: &impl Connection, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM \"user\" WHERE lower(email) = lower($1)");
    let row = conn.traced().query_opt(&sql, &[&email]).await?;
    map_opt(row)
}

pub async fn all_users(conn: &impl Connection) -> Result<Vec<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM \"user\" ORDER BY id");
    let rows = conn.traced().query(&sql, &[]).await?;
    map_rows(&rows)
}

pub async fn user_count(conn: &impl Connection) -> Result<i64> {
    let row = conn
        .traced()
        .query_one("SELECT COUNT(*) AS count FROM \"user\"", &[])
        .await?;
    Ok(row.try_get("count")?)
}

pub async fn update_user(conn: &impl Connection, id: i64, update: &UserUpdate) -> Result<Option<User>> {
    let sql = format!(
        "UPDATE \"user\" SET
            username = COALESCE($2, username),
            email = COALESCE($3, email),
            password_hash = COALESCE($4, password_hash)
         WHERE id = $1
         RETURNING {USER_COLUMNS}"
    );
    let row = conn
        .traced()
        .query_opt(
            &sql,
            &[&id, &update.username, &update.email, &update.password_hash],
        )
        .await?;
    map_opt(row)
}

pub async fn touch_last_login(conn: &impl Connection, id: i64, at: Timestamp) -> Result<()> {
    conn.traced()
        .execute(
            "UPDATE \"user\" SET last_login_at = $2 WHERE id = $1",
            &[&id, &at],
        )
        .await?;
    Ok(())
}

/// Forest stewards with the ids and names of the sites they administer.
pub async fn forest_stewards_with_sites(conn: &impl Connection) -> Result<Vec<StewardSites>> {
    let rows = conn
        .traced()
        .query(
            "SELECT u.id, u.username, u.email,
                COALESCE(array_agg(s.id ORDER BY s.id) FILTER (WHERE s.id IS NOT NULL), '{}') AS site_ids,
                COALESCE(array_agg(s.name ORDER BY s.id) FILTER (WHERE s.id IS NOT NULL), '{}') AS site_names
             FROM \"user\" u
             LEFT JOIN site_admin a ON a.user_id = u.id
             LEFT JOIN site s ON s.id = a.site_id
             WHERE u.role = $1
             GROUP BY u.id
             ORDER BY u.id",
            &[&Role::ForestSteward.as_str()],
        )
        .await?;
    map_rows(&rows)
}

pub async fn grant_site_admin(conn: &impl Connection, user_id: i64, site_id: i64) -> Result<()> {
    conn.traced()
        .execute(
            "INSERT INTO site_admin (user_id, site_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            &[&user_id, &site_id],
        )
        .await?;
    Ok(())
}

const INVITATION_COLUMNS: &str = "id, code, email, created_at, expires_at";

/// Store an invitation bound to `site_ids`. Run inside a transaction.
pub async fn insert_invitation(
    conn: &impl Connection,
    email: &str,
    site_ids: &[i64],
    now: Timestamp,
) -> Result<UserInvitation> {
    let code = invitation::generate_code();
    let expires_at = invitation::expires_at(now);
    let sql = format!(
        "INSERT INTO user_invitation (code, email, created_at, expires_at) VALUES ($1, $2, $3, $4)
         RETURNING {INVITATION_COLUMNS}"
    );
    let row = conn
        .traced()
        .query_one(&sql, &[&code, &email, &now, &expires_at])
        .await?;
    let created: UserInvitation = from_row(&row)?;

    conn.traced()
        .execute(
            "INSERT INTO user_invitation_site (invitation_id, site_id)
             SELECT DISTINCT $1::BIGINT, unnest($2::BIGINT[])",
            &[&created.id, &site_ids],
        )
        .await?;
    tracing::info!(invitation_id = created.id, sites = site_ids.len(), "created invitation");
    Ok(created)
}

pub async fn invitation_by_code(conn: &impl Connection, code: &str) -> Result<Option<UserInvitation>> {
    let sql = format!("SELECT {INVITATION_COLUMNS} FROM user_invitation WHERE code = $1");
    let row = conn.traced().query_opt(&sql, &[&code]).await?;
    map_opt(row)
}

pub async fn invitation_site_ids(conn: &impl Connection, invitation_id: i64) -> Result<Vec<i64>> {
    let rows = conn
        .traced()
        .query(
            "SELECT site_id FROM user_invitation_site WHERE invitation_id = $1 ORDER BY site_id",
            &[&invitation_id],
        )
        .await?;
    column(&rows, "site_id")
}

/// Delete an invitation and its site links. Returns whether it still existed.
pub async fn delete_invitation(conn: &impl Connection, invitation_id: i64) -> Result<bool> {
    conn.traced()
        .execute(
            "DELETE FROM user_invitation_site WHERE invitation_id = $1",
            &[&invitation_id],
        )
        .await?;
    let deleted = conn
        .traced()
        .execute("DELETE FROM user_invitation WHERE id = $1", &[&invitation_id])
        .await?;
    Ok(deleted == 1)
}

/// Check an invitation code without consuming it.
pub async fn validate_invitation(
    conn: &impl Connection,
    code: &str,
    now: Timestamp,
) -> std::result::Result<UserInvitation, RegistrationError> {
    let invitation = invitation_by_code(conn, code)
        .await?
        .ok_or(InvitationError::Invalid)?;
    invitation::check_not_expired(invitation.expires_at, now)?;
    Ok(invitation)
}

/// Lock an invitation for redemption. Run inside a transaction.
///
/// A concurrent redemption of the same code waits on the row lock and then
/// finds the row gone.
async fn claim_invitation(
    conn: &impl Connection,
    code: &str,
    now: Timestamp,
) -> std::result::Result<UserInvitation, RegistrationError> {
    let sql = format!("SELECT {INVITATION_COLUMNS} FROM user_invitation WHERE code = $1 FOR UPDATE");
    let row = conn.traced().query_opt(&sql, &[&code]).await?;
    let invitation: UserInvitation = map_opt(row)?.ok_or(InvitationError::Invalid)?;
    invitation::check_not_expired(invitation.expires_at, now)?;
    Ok(invitation)
}

/// Create an account. Run inside a transaction.
///
/// Without a code the user gets the `User` role. With one, the invitation is
/// checked, the user becomes a forest steward of every site it names, and the
/// invitation is deleted so it cannot be redeemed twice.
pub async fn register(
    conn: &impl Connection,
    username: &str,
    email: &str,
    password_hash: &str,
    code: Option<&str>,
    now: Timestamp,
) -> std::result::Result<User, RegistrationError> {
    let invitation = match code {
        Some(code) => Some(claim_invitation(conn, code, now).await?),
        None => None,
    };

    let new = NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role: if invitation.is_some() {
            Role::ForestSteward
        } else {
            Role::User
        },
    };
    let user = insert_user(conn, &new).await?;

    if let Some(invitation) = invitation {
        let site_ids = invitation_site_ids(conn, invitation.id).await?;
        for site_id in &site_ids {
            grant_site_admin(conn, user.id, *site_id).await?;
        }
        if !delete_invitation(conn, invitation.id).await? {
            return Err(InvitationError::Invalid.into());
        }
        tracing::info!(
            user_id = user.id,
            invitation_id = invitation.id,
            sites = site_ids.len(),
            "redeemed invitation"
        );
    }

    Ok(user)
}

pub async fn revoke_token(conn: &impl Connection, jti: &str, expires_at: Timestamp) -> Result<()> {
    conn.traced()
        .execute(
            "INSERT INTO revoked_token (jti, expires_at) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            &[&jti, &expires_at],
        )
        .await?;
    Ok(())
}

pub async fn is_token_revoked(conn: &impl Connection, jti: &str) -> Result<bool> {
    let row = conn
        .traced()
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM revoked_token WHERE jti = $1) AS revoked",
            &[&jti],
        )
        .await?;
    Ok(row.try_get("revoked")?)
}

/// Forget revocations of tokens that have expired anyway.
pub async fn purge_revoked_tokens(conn: &impl Connection, now: Timestamp) -> Result<u64> {
    Ok(conn
        .traced()
        .execute("DELETE FROM revoked_token WHERE expires_at < $1", &[&now])
        .await?)
}
