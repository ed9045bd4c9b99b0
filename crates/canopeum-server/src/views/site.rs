use canopeum::Weather;
use canopeum::summary::SiteFigures;
use canopeum_db::model::{Announcement, Contact, Coordinate, Site, UserSummary};
use canopeum_db::queries::batch::batches_for_site;
use canopeum_db::queries::lookup::{LookupTable, find};
use canopeum_db::queries::site::{
    announcement_by_id, contact_by_id, coordinate_by_id, site_admins, site_batch_figures,
    site_tree_species,
};
use canopeum_db::{Connection, Result};
use jiff::Timestamp;
use serde::Serialize;

use super::batch::{BatchView, SponsorView};
use super::{AssetView, LookupView, SpeciesView, asset_view};
use crate::media::MediaStore;

#[derive(Debug, Clone, Serialize)]
pub struct CoordinateView {
    pub id: i64,
    pub dms_latitude: String,
    pub dms_longitude: String,
    pub dd_latitude: f64,
    pub dd_longitude: f64,
    pub address: String,
}

impl From<Coordinate> for CoordinateView {
    fn from(c: Coordinate) -> Self {
        CoordinateView {
            id: c.id,
            dms_latitude: c.dms_latitude,
            dms_longitude: c.dms_longitude,
            dd_latitude: c.dd_latitude,
            dd_longitude: c.dd_longitude,
            address: c.address,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactView {
    pub id: i64,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub facebook_link: Option<String>,
    pub x_link: Option<String>,
    pub instagram_link: Option<String>,
    pub linkedin_link: Option<String>,
}

impl From<Contact> for ContactView {
    fn from(c: Contact) -> Self {
        ContactView {
            id: c.id,
            address: c.address,
            email: c.email,
            phone: c.phone,
            facebook_link: c.facebook_link,
            x_link: c.x_link,
            instagram_link: c.instagram_link,
            linkedin_link: c.linkedin_link,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementView {
    pub id: i64,
    pub body: Option<String>,
    pub link: Option<String>,
}

impl From<Announcement> for AnnouncementView {
    fn from(a: Announcement) -> Self {
        AnnouncementView {
            id: a.id,
            body: a.body,
            link: a.link,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummaryView {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<UserSummary> for UserSummaryView {
    fn from(u: UserSummary) -> Self {
        UserSummaryView {
            id: u.id,
            username: u.username,
            email: u.email,
        }
    }
}

pub(crate) async fn site_type(conn: &impl Connection, site: &Site) -> Result<Option<LookupView>> {
    match site.site_type_id {
        Some(id) => Ok(find(conn, LookupTable::SiteType, id).await?.map(Into::into)),
        None => Ok(None),
    }
}

pub(crate) async fn coordinate(conn: &impl Connection, site: &Site) -> Result<Option<CoordinateView>> {
    match site.coordinate_id {
        Some(id) => Ok(coordinate_by_id(conn, id).await?.map(Into::into)),
        None => Ok(None),
    }
}

pub(crate) async fn contact(conn: &impl Connection, site: &Site) -> Result<Option<ContactView>> {
    match site.contact_id {
        Some(id) => Ok(contact_by_id(conn, id).await?.map(Into::into)),
        None => Ok(None),
    }
}

pub(crate) async fn announcement(conn: &impl Connection, site: &Site) -> Result<Option<AnnouncementView>> {
    match site.announcement_id {
        Some(id) => Ok(announcement_by_id(conn, id).await?.map(Into::into)),
        None => Ok(None),
    }
}

/// A site with everything it owns directly.
#[derive(Debug, Clone, Serialize)]
pub struct SiteView {
    pub id: i64,
    pub name: String,
    pub is_public: bool,
    pub site_type: Option<LookupView>,
    pub coordinate: Option<CoordinateView>,
    pub description: Option<String>,
    pub size: Option<String>,
    pub research_partnership: Option<bool>,
    pub visible_map: Option<bool>,
    pub visitor_count: Option<i32>,
    pub contact: Option<ContactView>,
    pub announcement: Option<AnnouncementView>,
    pub image: Option<AssetView>,
    pub site_tree_species: Vec<SpeciesView>,
    pub created_at: Timestamp,
}

impl SiteView {
    pub async fn load(conn: &impl Connection, media: &MediaStore, site: Site) -> Result<Self> {
        Ok(SiteView {
            site_type: site_type(conn, &site).await?,
            coordinate: coordinate(conn, &site).await?,
            contact: contact(conn, &site).await?,
            announcement: announcement(conn, &site).await?,
            image: asset_view(conn, media, site.image_id).await?,
            site_tree_species: site_tree_species(conn, site.id)
                .await?
                .into_iter()
                .map(Into::into)
                .collect(),
            id: site.id,
            name: site.name,
            is_public: site.is_public,
            description: site.description,
            size: site.size,
            research_partnership: site.research_partnership,
            visible_map: site.visible_map,
            visitor_count: site.visitor_count,
            created_at: site.created_at,
        })
    }
}

/// A site with its computed figures, as shown on the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSummaryView {
    pub id: i64,
    pub name: String,
    pub coordinate: Option<CoordinateView>,
    pub site_type: Option<LookupView>,
    #[serde(flatten)]
    pub figures: SiteFigures,
    pub visitor_count: Option<i32>,
    pub admins: Vec<UserSummaryView>,
    pub batches: Vec<BatchView>,
}

impl SiteSummaryView {
    pub async fn load(conn: &impl Connection, media: &MediaStore, site: Site) -> Result<Self> {
        let species = site_tree_species(conn, site.id).await?;
        let batch_figures = site_batch_figures(conn, site.id).await?;
        let figures = SiteFigures::compute(species.iter().map(|s| s.quantity), &batch_figures);
        let batches = batches_for_site(conn, site.id).await?;

        Ok(SiteSummaryView {
            coordinate: coordinate(conn, &site).await?,
            site_type: site_type(conn, &site).await?,
            figures,
            admins: site_admins(conn, site.id)
                .await?
                .into_iter()
                .map(Into::into)
                .collect(),
            batches: BatchView::load_all(conn, media, batches).await?,
            id: site.id,
            name: site.name,
            visitor_count: site.visitor_count,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteSummaryDetailView {
    #[serde(flatten)]
    pub summary: SiteSummaryView,
    pub sponsors: Vec<SponsorView>,
    pub weather: Weather,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapCoordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

/// A public site as a map pin.
#[derive(Debug, Clone, Serialize)]
pub struct SiteMapView {
    pub id: i64,
    pub name: String,
    pub site_type: Option<LookupView>,
    pub coordinates: MapCoordinates,
    pub image: Option<AssetView>,
}

impl SiteMapView {
    /// `None` when the site lost its coordinate in the meantime.
    pub async fn load(conn: &impl Connection, media: &MediaStore, site: Site) -> Result<Option<Self>> {
        let Some(coordinate) = coordinate(conn, &site).await? else {
            return Ok(None);
        };
        Ok(Some(SiteMapView {
            site_type: site_type(conn, &site).await?,
            image: asset_view(conn, media, site.image_id).await?,
            coordinates: MapCoordinates {
                latitude: coordinate.dd_latitude,
                longitude: coordinate.dd_longitude,
                address: coordinate.address,
            },
            id: site.id,
            name: site.name,
        }))
    }
}
