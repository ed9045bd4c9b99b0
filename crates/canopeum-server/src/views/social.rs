use std::collections::HashMap;

use canopeum_db::model::{Site, Widget};
use canopeum_db::queries::site::{site_sponsors, widgets};
use canopeum_db::queries::social::{CommentRow, PostRow, post_media};
use canopeum_db::{Connection, Result};
use jiff::Timestamp;
use serde::Serialize;

use super::site::{AnnouncementView, ContactView, announcement, contact, site_type};
use super::{AssetView, LookupView, asset_view, asset_views};
use crate::media::MediaStore;

#[derive(Debug, Clone, Serialize)]
pub struct SiteOverview {
    pub id: i64,
    pub name: String,
    pub image: Option<AssetView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i64,
    pub site: SiteOverview,
    pub created_at: Timestamp,
    pub body: String,
    pub share_count: i32,
    pub like_count: i64,
    pub comment_count: i64,
    pub has_liked: bool,
    pub media: Vec<AssetView>,
}

impl PostView {
    /// Views for a page of posts, with media and site images in two queries.
    pub async fn load_all(conn: &impl Connection, media: &MediaStore, rows: Vec<PostRow>) -> Result<Vec<Self>> {
        let post_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut media_by_post: HashMap<i64, Vec<AssetView>> = HashMap::new();
        if !post_ids.is_empty() {
            for item in post_media(conn, &post_ids).await? {
                media_by_post
                    .entry(item.post_id)
                    .or_default()
                    .push(AssetView::new(item.id, &item.path, media));
            }
        }
        let images = asset_views(conn, media, rows.iter().map(|row| row.site_image_id)).await?;

        Ok(rows
            .into_iter()
            .map(|row| PostView {
                id: row.id,
                site: SiteOverview {
                    id: row.site_id,
                    name: row.site_name,
                    image: row.site_image_id.and_then(|id| images.get(&id).cloned()),
                },
                created_at: row.created_at,
                body: row.body,
                share_count: row.share_count,
                like_count: row.like_count,
                comment_count: row.comment_count,
                has_liked: row.has_liked,
                media: media_by_post.remove(&row.id).unwrap_or_default(),
            })
            .collect())
    }

    pub async fn load(conn: &impl Connection, media: &MediaStore, row: PostRow) -> Result<Self> {
        let mut views = PostView::load_all(conn, media, vec![row]).await?;
        Ok(views.remove(0))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub body: String,
    pub author_id: i64,
    pub author_username: String,
    pub created_at: Timestamp,
}

impl From<CommentRow> for CommentView {
    fn from(c: CommentRow) -> Self {
        CommentView {
            id: c.id,
            body: c.body,
            author_id: c.author_id,
            author_username: c.author_username,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WidgetView {
    pub id: i64,
    pub site_id: i64,
    pub title: String,
    pub body: String,
}

impl From<Widget> for WidgetView {
    fn from(w: Widget) -> Self {
        WidgetView {
            id: w.id,
            site_id: w.site_id,
            title: w.title,
            body: w.body,
        }
    }
}

/// A site's public page.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSocialView {
    pub id: i64,
    pub name: String,
    pub is_public: bool,
    pub site_type: Option<LookupView>,
    pub image: Option<AssetView>,
    pub description: Option<String>,
    pub contact: Option<ContactView>,
    pub announcement: Option<AnnouncementView>,
    /// Sponsor names, most recently updated batch first.
    pub sponsors: Vec<String>,
    pub widgets: Vec<WidgetView>,
}

impl SiteSocialView {
    pub async fn load(conn: &impl Connection, media: &MediaStore, site: Site) -> Result<Self> {
        Ok(SiteSocialView {
            site_type: site_type(conn, &site).await?,
            image: asset_view(conn, media, site.image_id).await?,
            contact: contact(conn, &site).await?,
            announcement: announcement(conn, &site).await?,
            sponsors: site_sponsors(conn, site.id)
                .await?
                .into_iter()
                .map(|sponsor| sponsor.name)
                .collect(),
            widgets: widgets(conn, site.id)
                .await?
                .into_iter()
                .map(Into::into)
                .collect(),
            id: site.id,
            name: site.name,
            is_public: site.is_public,
            description: site.description,
        })
    }
}
