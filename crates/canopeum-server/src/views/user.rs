use canopeum::Role;
use canopeum_db::model::{StewardSites, User, UserInvitation};
use canopeum_db::queries::site::{admin_site_ids, all_site_ids, followed_site_ids};
use canopeum_db::{Connection, Result};
use jiff::Timestamp;
use serde::Serialize;

use crate::auth::TokenPair;

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub admin_site_ids: Vec<i64>,
    pub followed_site_ids: Vec<i64>,
    pub created_at: Timestamp,
    pub last_login_at: Option<Timestamp>,
}

impl UserView {
    /// A MegaAdmin administers and follows every site.
    pub async fn load(conn: &impl Connection, user: User) -> Result<Self> {
        let role = user.role()?;
        let (admin_site_ids, followed_site_ids) = if role.is_mega_admin() {
            let all = all_site_ids(conn).await?;
            (all.clone(), all)
        } else {
            (
                admin_site_ids(conn, user.id).await?,
                followed_site_ids(conn, user.id).await?,
            )
        };
        Ok(UserView {
            id: user.id,
            username: user.username,
            email: user.email,
            role,
            admin_site_ids,
            followed_site_ids,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthView {
    pub token: TokenPair,
    pub user: UserView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminUserSitesView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub sites: Vec<SiteRef>,
}

impl From<StewardSites> for AdminUserSitesView {
    fn from(s: StewardSites) -> Self {
        AdminUserSitesView {
            id: s.id,
            username: s.username,
            email: s.email,
            sites: s
                .site_ids
                .into_iter()
                .zip(s.site_names)
                .map(|(id, name)| SiteRef { id, name })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvitationView {
    pub id: i64,
    pub code: String,
    pub email: String,
    pub expires_at: Timestamp,
}

impl From<UserInvitation> for InvitationView {
    fn from(i: UserInvitation) -> Self {
        InvitationView {
            id: i.id,
            code: i.code,
            email: i.email,
            expires_at: i.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steward_sites_pair_ids_with_names() {
        let view = AdminUserSitesView::from(StewardSites {
            id: 2,
            username: "TyrionLannister".to_string(),
            email: "tyrion@lannister.com".to_string(),
            site_ids: vec![1, 3],
            site_names: vec!["Canopeum".to_string(), "Lakeside Oasis".to_string()],
        });
        insta::assert_snapshot!(
            serde_json::to_string(&view).unwrap(),
            @r#"{"id":2,"username":"TyrionLannister","email":"tyrion@lannister.com","sites":[{"id":1,"name":"Canopeum"},{"id":3,"name":"Lakeside Oasis"}]}"#
        );
    }
}
