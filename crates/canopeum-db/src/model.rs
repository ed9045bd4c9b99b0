//! Row types.
//!
//! Each struct mirrors a table (or a fixed projection of one) and is filled
//! by [`from_row`](crate::from_row) by column name.

use canopeum::Role;
use facet::Facet;
use jiff::Timestamp;

use crate::DbError;

#[derive(Debug, Clone, Facet)]
pub struct Asset {
    pub id: i64,
    /// Path relative to the media root.
    pub path: String,
    pub created_at: Timestamp,
}

/// A lookup entry (tree type, site type, fertilizer or mulch layer) with its
/// bilingual name.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct LookupItem {
    pub id: i64,
    pub en: String,
    pub fr: String,
}

#[derive(Debug, Clone, Facet)]
pub struct Coordinate {
    pub id: i64,
    pub dms_latitude: String,
    pub dms_longitude: String,
    pub dd_latitude: f64,
    pub dd_longitude: f64,
    pub address: String,
}

#[derive(Debug, Clone, Default, Facet)]
pub struct Contact {
    pub id: i64,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub facebook_link: Option<String>,
    pub x_link: Option<String>,
    pub instagram_link: Option<String>,
    pub linkedin_link: Option<String>,
}

#[derive(Debug, Clone, Default, Facet)]
pub struct Announcement {
    pub id: i64,
    pub body: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Facet)]
pub struct Site {
    pub id: i64,
    pub name: String,
    pub is_public: bool,
    pub site_type_id: Option<i64>,
    pub coordinate_id: Option<i64>,
    pub description: Option<String>,
    pub size: Option<String>,
    pub research_partnership: Option<bool>,
    pub visible_map: Option<bool>,
    pub visitor_count: Option<i32>,
    pub contact_id: Option<i64>,
    pub announcement_id: Option<i64>,
    pub image_id: Option<i64>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Facet)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: Timestamp,
    pub last_login_at: Option<Timestamp>,
}

impl User {
    pub fn role(&self) -> Result<Role, DbError> {
        self.role.parse().map_err(|_| DbError::InvalidValue {
            column: "user.role",
            message: format!("unknown role {:?}", self.role),
        })
    }
}

#[derive(Debug, Clone, Facet)]
pub struct Batch {
    pub id: i64,
    pub site_id: i64,
    pub name: String,
    pub sponsor_id: Option<i64>,
    pub size: Option<i32>,
    pub soil_condition: Option<String>,
    pub survived_count: Option<i32>,
    pub replace_count: Option<i32>,
    pub total_propagation: Option<i32>,
    pub image_id: Option<i64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Facet)]
pub struct BatchSponsor {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub logo_id: Option<i64>,
}

/// A species or seed line of a batch, or a species line of a site.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct SpeciesQuantity {
    /// Tree type id.
    pub id: i64,
    pub en: String,
    pub fr: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Facet)]
pub struct Widget {
    pub id: i64,
    pub site_id: i64,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Facet)]
pub struct Post {
    pub id: i64,
    pub site_id: i64,
    pub body: String,
    pub share_count: i32,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Facet)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub body: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Facet)]
pub struct UserInvitation {
    pub id: i64,
    pub code: String,
    pub email: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

/// A user as shown in admin listings.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// A forest steward and the sites they administer.
#[derive(Debug, Clone, Facet)]
pub struct StewardSites {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub site_ids: Vec<i64>,
    pub site_names: Vec<String>,
}
