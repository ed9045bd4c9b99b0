//! Sites and everything hanging off them: coordinates, contacts,
//! announcements, tree species, admins, followers and widgets.

use canopeum::summary::BatchFigures;
use facet::Facet;

use crate::model::{
    Announcement, BatchSponsor, Contact, Coordinate, Site, SpeciesQuantity, UserSummary, Widget,
};
use crate::queries::asset::delete_assets;
use crate::{Connection, ConnectionExt, Result, from_row};

use super::{column, map_opt, map_rows};

const SITE_COLUMNS: &str = "id, name, is_public, site_type_id, coordinate_id, description, size, \
     research_partnership, visible_map, visitor_count, contact_id, announcement_id, image_id, \
     created_at";

/// Fields of a site being created. The coordinate is already normalized.
#[derive(Debug, Clone)]
pub struct NewSite {
    pub name: String,
    pub is_public: bool,
    pub site_type_id: Option<i64>,
    pub coordinate: canopeum::Coordinate,
    pub description: Option<String>,
    pub size: Option<String>,
    pub research_partnership: Option<bool>,
    pub visible_map: Option<bool>,
    pub visitor_count: Option<i32>,
    pub image_id: Option<i64>,
    /// `(tree_type_id, quantity)` pairs.
    pub species: Vec<(i64, i32)>,
}

/// Partial site update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct SiteUpdate {
    pub name: Option<String>,
    pub site_type_id: Option<i64>,
    pub description: Option<String>,
    pub size: Option<String>,
    pub research_partnership: Option<bool>,
    pub visible_map: Option<bool>,
    pub visitor_count: Option<i32>,
    pub image_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ContactUpdate {
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub facebook_link: Option<String>,
    pub x_link: Option<String>,
    pub instagram_link: Option<String>,
    pub linkedin_link: Option<String>,
}

pub async fn insert_coordinate(
    conn: &impl Connection,
    coordinate: &canopeum::Coordinate,
) -> Result<Coordinate> {
    let row = conn
        .traced()
        .query_one(
            "INSERT INTO coordinate (dms_latitude, dms_longitude, dd_latitude, dd_longitude, address)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, dms_latitude, dms_longitude, dd_latitude, dd_longitude, address",
            &[
                &coordinate.dms_latitude,
                &coordinate.dms_longitude,
                &coordinate.dd_latitude,
                &coordinate.dd_longitude,
                &coordinate.address,
            ],
        )
        .await?;
    Ok(from_row(&row)?)
}

/// Create a site with an empty contact and announcement. Run inside a
/// transaction.
pub async fn create_site(conn: &impl Connection, new: &NewSite) -> Result<Site> {
    let coordinate = insert_coordinate(conn, &new.coordinate).await?;
    let contact_id: i64 = conn
        .traced()
        .query_one("INSERT INTO contact DEFAULT VALUES RETURNING id", &[])
        .await?
        .try_get("id")?;
    let announcement_id: i64 = conn
        .traced()
        .query_one("INSERT INTO announcement DEFAULT VALUES RETURNING id", &[])
        .await?
        .try_get("id")?;

    let sql = format!(
        "INSERT INTO site (name, is_public, site_type_id, coordinate_id, description, size,
            research_partnership, visible_map, visitor_count, contact_id, announcement_id, image_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         RETURNING {SITE_COLUMNS}"
    );
    let row = conn
        .traced()
        .query_one(
            &sql,
            &[
                &new.name,
                &new.is_public,
                &new.site_type_id,
                &coordinate.id,
                &new.description,
                &new.size,
                &new.research_partnership,
                &new.visible_map,
                &new.visitor_count,
                &contact_id,
                &announcement_id,
                &new.image_id,
            ],
        )
        .await?;
    let site: Site = from_row(&row)?;

    replace_tree_species(conn, site.id, &new.species).await?;
    tracing::info!(site_id = site.id, name = %site.name, "created site");
    Ok(site)
}

pub async fn site_by_id(conn: &impl Connection, id: i64) -> Result<Option<Site>> {
    let sql = format!("SELECT {SITE_COLUMNS} FROM site WHERE id = $1");
    let row = conn.traced().query_opt(&sql, &[&id]).await?;
    map_opt(row)
}

pub async fn all_sites(conn: &impl Connection) -> Result<Vec<Site>> {
    let sql = format!("SELECT {SITE_COLUMNS} FROM site ORDER BY id");
    let rows = conn.traced().query(&sql, &[]).await?;
    map_rows(&rows)
}

pub async fn sites_by_ids(conn: &impl Connection, ids: &[i64]) -> Result<Vec<Site>> {
    let sql = format!("SELECT {SITE_COLUMNS} FROM site WHERE id = ANY($1) ORDER BY id");
    let rows = conn.traced().query(&sql, &[&ids]).await?;
    map_rows(&rows)
}

/// Public sites that can be placed on the map.
pub async fn map_sites(conn: &impl Connection) -> Result<Vec<Site>> {
    let sql = format!(
        "SELECT {SITE_COLUMNS} FROM site
         WHERE is_public AND coordinate_id IS NOT NULL AND COALESCE(visible_map, TRUE)
         ORDER BY id"
    );
    let rows = conn.traced().query(&sql, &[]).await?;
    map_rows(&rows)
}

pub async fn update_site(conn: &impl Connection, id: i64, update: &SiteUpdate) -> Result<Option<Site>> {
    let sql = format!(
        "UPDATE site SET
            name = COALESCE($2, name),
            site_type_id = COALESCE($3, site_type_id),
            description = COALESCE($4, description),
            size = COALESCE($5, size),
            research_partnership = COALESCE($6, research_partnership),
            visible_map = COALESCE($7, visible_map),
            visitor_count = COALESCE($8, visitor_count),
            image_id = COALESCE($9, image_id)
         WHERE id = $1
         RETURNING {SITE_COLUMNS}"
    );
    let row = conn
        .traced()
        .query_opt(
            &sql,
            &[
                &id,
                &update.name,
                &update.site_type_id,
                &update.description,
                &update.size,
                &update.research_partnership,
                &update.visible_map,
                &update.visitor_count,
                &update.image_id,
            ],
        )
        .await?;
    map_opt(row)
}

/// Overwrite a site's coordinate in place.
pub async fn update_coordinate(
    conn: &impl Connection,
    coordinate_id: i64,
    coordinate: &canopeum::Coordinate,
) -> Result<()> {
    conn.traced()
        .execute(
            "UPDATE coordinate SET dms_latitude = $2, dms_longitude = $3, dd_latitude = $4,
                dd_longitude = $5, address = $6
             WHERE id = $1",
            &[
                &coordinate_id,
                &coordinate.dms_latitude,
                &coordinate.dms_longitude,
                &coordinate.dd_latitude,
                &coordinate.dd_longitude,
                &coordinate.address,
            ],
        )
        .await?;
    Ok(())
}

/// Store a site's coordinate, creating and linking a row when the site has none.
pub async fn set_site_coordinate(
    conn: &impl Connection,
    site: Site,
    coordinate: &canopeum::Coordinate,
) -> Result<Site> {
    if let Some(coordinate_id) = site.coordinate_id {
        update_coordinate(conn, coordinate_id, coordinate).await?;
        return Ok(site);
    }
    let created = insert_coordinate(conn, coordinate).await?;
    let sql = format!("UPDATE site SET coordinate_id = $2 WHERE id = $1 RETURNING {SITE_COLUMNS}");
    let row = conn.traced().query_one(&sql, &[&site.id, &created.id]).await?;
    Ok(from_row(&row)?)
}

pub async fn set_public(conn: &impl Connection, id: i64, is_public: bool) -> Result<Option<Site>> {
    let sql = format!("UPDATE site SET is_public = $2 WHERE id = $1 RETURNING {SITE_COLUMNS}");
    let row = conn.traced().query_opt(&sql, &[&id, &is_public]).await?;
    map_opt(row)
}

pub async fn coordinate_by_id(conn: &impl Connection, id: i64) -> Result<Option<Coordinate>> {
    let row = conn
        .traced()
        .query_opt(
            "SELECT id, dms_latitude, dms_longitude, dd_latitude, dd_longitude, address
             FROM coordinate WHERE id = $1",
            &[&id],
        )
        .await?;
    map_opt(row)
}

pub async fn contact_by_id(conn: &impl Connection, id: i64) -> Result<Option<Contact>> {
    let row = conn
        .traced()
        .query_opt(
            "SELECT id, address, email, phone, facebook_link, x_link, instagram_link, linkedin_link
             FROM contact WHERE id = $1",
            &[&id],
        )
        .await?;
    map_opt(row)
}

pub async fn announcement_by_id(conn: &impl Connection, id: i64) -> Result<Option<Announcement>> {
    let row = conn
        .traced()
        .query_opt("SELECT id, body, link FROM announcement WHERE id = $1", &[&id])
        .await?;
    map_opt(row)
}

/// Update the contact of a site. Returns `None` when `contact_id` is not that
/// site's contact.
pub async fn update_contact(
    conn: &impl Connection,
    site_id: i64,
    contact_id: i64,
    update: &ContactUpdate,
) -> Result<Option<Contact>> {
    let row = conn
        .traced()
        .query_opt(
            "UPDATE contact SET
                address = COALESCE($3, address),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                facebook_link = COALESCE($6, facebook_link),
                x_link = COALESCE($7, x_link),
                instagram_link = COALESCE($8, instagram_link),
                linkedin_link = COALESCE($9, linkedin_link)
             WHERE id = $2 AND id = (SELECT contact_id FROM site WHERE id = $1)
             RETURNING id, address, email, phone, facebook_link, x_link, instagram_link, linkedin_link",
            &[
                &site_id,
                &contact_id,
                &update.address,
                &update.email,
                &update.phone,
                &update.facebook_link,
                &update.x_link,
                &update.instagram_link,
                &update.linkedin_link,
            ],
        )
        .await?;
    map_opt(row)
}

/// Replace the announcement text of a site, creating the row if the site has
/// none yet.
pub async fn update_announcement(
    conn: &impl Connection,
    site_id: i64,
    body: Option<&str>,
    link: Option<&str>,
) -> Result<Option<Announcement>> {
    let row = conn
        .traced()
        .query_opt(
            "UPDATE announcement SET body = $2, link = $3
             WHERE id = (SELECT announcement_id FROM site WHERE id = $1)
             RETURNING id, body, link",
            &[&site_id, &body, &link],
        )
        .await?;
    if let Some(row) = row {
        return Ok(Some(from_row(&row)?));
    }

    if site_by_id(conn, site_id).await?.is_none() {
        return Ok(None);
    }
    let row = conn
        .traced()
        .query_one(
            "INSERT INTO announcement (body, link) VALUES ($1, $2) RETURNING id, body, link",
            &[&body, &link],
        )
        .await?;
    let announcement: Announcement = from_row(&row)?;
    conn.traced()
        .execute(
            "UPDATE site SET announcement_id = $2 WHERE id = $1",
            &[&site_id, &announcement.id],
        )
        .await?;
    Ok(Some(announcement))
}

pub async fn site_tree_species(conn: &impl Connection, site_id: i64) -> Result<Vec<SpeciesQuantity>> {
    let rows = conn
        .traced()
        .query(
            "SELECT t.id, i.en, i.fr, s.quantity
             FROM site_tree_species s
             JOIN tree_type t ON t.id = s.tree_type_id
             JOIN internationalization i ON i.id = t.name_id
             WHERE s.site_id = $1
             ORDER BY t.id",
            &[&site_id],
        )
        .await?;
    map_rows(&rows)
}

/// Replace the tree species of a site with `(tree_type_id, quantity)` pairs.
pub async fn replace_tree_species(
    conn: &impl Connection,
    site_id: i64,
    species: &[(i64, i32)],
) -> Result<()> {
    conn.traced()
        .execute("DELETE FROM site_tree_species WHERE site_id = $1", &[&site_id])
        .await?;
    for (tree_type_id, quantity) in species {
        conn.traced()
            .execute(
                "INSERT INTO site_tree_species (site_id, tree_type_id, quantity) VALUES ($1, $2, $3)",
                &[&site_id, tree_type_id, quantity],
            )
            .await?;
    }
    Ok(())
}

pub async fn is_site_admin(conn: &impl Connection, user_id: i64, site_id: i64) -> Result<bool> {
    let row = conn
        .traced()
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM site_admin WHERE user_id = $1 AND site_id = $2) AS admin",
            &[&user_id, &site_id],
        )
        .await?;
    Ok(row.try_get("admin")?)
}

pub async fn admin_site_ids(conn: &impl Connection, user_id: i64) -> Result<Vec<i64>> {
    let rows = conn
        .traced()
        .query(
            "SELECT site_id FROM site_admin WHERE user_id = $1 ORDER BY site_id",
            &[&user_id],
        )
        .await?;
    column(&rows, "site_id")
}

pub async fn followed_site_ids(conn: &impl Connection, user_id: i64) -> Result<Vec<i64>> {
    let rows = conn
        .traced()
        .query(
            "SELECT site_id FROM site_follower WHERE user_id = $1 ORDER BY site_id",
            &[&user_id],
        )
        .await?;
    column(&rows, "site_id")
}

pub async fn all_site_ids(conn: &impl Connection) -> Result<Vec<i64>> {
    let rows = conn.traced().query("SELECT id FROM site ORDER BY id", &[]).await?;
    column(&rows, "id")
}

pub async fn site_admins(conn: &impl Connection, site_id: i64) -> Result<Vec<UserSummary>> {
    let rows = conn
        .traced()
        .query(
            "SELECT u.id, u.username, u.email
             FROM site_admin a JOIN \"user\" u ON u.id = a.user_id
             WHERE a.site_id = $1
             ORDER BY u.id",
            &[&site_id],
        )
        .await?;
    map_rows(&rows)
}

/// Make exactly `user_ids` the admins of a site. Run inside a transaction.
pub async fn replace_site_admins(
    conn: &impl Connection,
    site_id: i64,
    user_ids: &[i64],
) -> Result<()> {
    conn.traced()
        .execute("DELETE FROM site_admin WHERE site_id = $1", &[&site_id])
        .await?;
    conn.traced()
        .execute(
            "INSERT INTO site_admin (user_id, site_id)
             SELECT DISTINCT unnest($2::BIGINT[]), $1::BIGINT",
            &[&site_id, &user_ids],
        )
        .await?;
    tracing::info!(site_id, admins = user_ids.len(), "replaced site admins");
    Ok(())
}

/// Returns `false` if the user already follows the site.
pub async fn follow(conn: &impl Connection, user_id: i64, site_id: i64) -> Result<bool> {
    let inserted = conn
        .traced()
        .execute(
            "INSERT INTO site_follower (user_id, site_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            &[&user_id, &site_id],
        )
        .await?;
    Ok(inserted == 1)
}

/// Returns `false` if the user was not following the site.
pub async fn unfollow(conn: &impl Connection, user_id: i64, site_id: i64) -> Result<bool> {
    let deleted = conn
        .traced()
        .execute(
            "DELETE FROM site_follower WHERE user_id = $1 AND site_id = $2",
            &[&user_id, &site_id],
        )
        .await?;
    Ok(deleted == 1)
}

pub async fn widgets(conn: &impl Connection, site_id: i64) -> Result<Vec<Widget>> {
    let rows = conn
        .traced()
        .query(
            "SELECT id, site_id, title, body FROM widget WHERE site_id = $1 ORDER BY id",
            &[&site_id],
        )
        .await?;
    map_rows(&rows)
}

pub async fn insert_widget(conn: &impl Connection, site_id: i64, title: &str, body: &str) -> Result<Widget> {
    let row = conn
        .traced()
        .query_one(
            "INSERT INTO widget (site_id, title, body) VALUES ($1, $2, $3)
             RETURNING id, site_id, title, body",
            &[&site_id, &title, &body],
        )
        .await?;
    Ok(from_row(&row)?)
}

pub async fn update_widget(
    conn: &impl Connection,
    site_id: i64,
    widget_id: i64,
    title: Option<&str>,
    body: Option<&str>,
) -> Result<Option<Widget>> {
    let row = conn
        .traced()
        .query_opt(
            "UPDATE widget SET title = COALESCE($3, title), body = COALESCE($4, body)
             WHERE site_id = $1 AND id = $2
             RETURNING id, site_id, title, body",
            &[&site_id, &widget_id, &title, &body],
        )
        .await?;
    map_opt(row)
}

pub async fn delete_widget(conn: &impl Connection, site_id: i64, widget_id: i64) -> Result<bool> {
    let deleted = conn
        .traced()
        .execute(
            "DELETE FROM widget WHERE site_id = $1 AND id = $2",
            &[&site_id, &widget_id],
        )
        .await?;
    Ok(deleted == 1)
}

#[derive(Facet)]
struct BatchFiguresRow {
    plant_count: i64,
    survived_count: Option<i32>,
    total_propagation: Option<i32>,
}

/// Per-batch figures feeding the site summary.
pub async fn site_batch_figures(conn: &impl Connection, site_id: i64) -> Result<Vec<BatchFigures>> {
    let rows = conn
        .traced()
        .query(
            "SELECT b.survived_count, b.total_propagation,
                COALESCE((SELECT SUM(s.quantity) FROM batch_species s WHERE s.batch_id = b.id), 0)::BIGINT
                    AS plant_count
             FROM batch b
             WHERE b.site_id = $1",
            &[&site_id],
        )
        .await?;
    let figures: Vec<BatchFiguresRow> = map_rows(&rows)?;
    Ok(figures
        .into_iter()
        .map(|row| BatchFigures {
            plant_count: row.plant_count,
            survived_count: row.survived_count,
            total_propagation: row.total_propagation,
        })
        .collect())
}

/// Sponsors of the site's batches.
pub async fn site_sponsors(conn: &impl Connection, site_id: i64) -> Result<Vec<BatchSponsor>> {
    let rows = conn
        .traced()
        .query(
            "SELECT s.id, s.name, s.url, s.logo_id
             FROM batch b JOIN batch_sponsor s ON s.id = b.sponsor_id
             WHERE b.site_id = $1
             ORDER BY b.updated_at DESC",
            &[&site_id],
        )
        .await?;
    map_rows(&rows)
}

#[derive(Facet)]
struct DeletedSite {
    coordinate_id: Option<i64>,
    contact_id: Option<i64>,
    announcement_id: Option<i64>,
    image_id: Option<i64>,
}

/// Delete a site and everything it owns, returning the media paths of the
/// deleted assets. Returns `None` if the site does not exist.
///
/// Must run inside a transaction. Rows go in this order: post likes, comments
/// and media links; posts; batch compositions, batches and sponsors; widgets,
/// tree species, followers, admins and invitation bindings; the site; its
/// coordinate, contact and announcement; finally the assets.
pub async fn delete_site(conn: &impl Connection, site_id: i64) -> Result<Option<Vec<String>>> {
    let exists = conn
        .traced()
        .query_opt("SELECT id FROM site WHERE id = $1 FOR UPDATE", &[&site_id])
        .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let db = conn.traced();
    let mut asset_ids: Vec<i64> = Vec::new();

    const SITE_POSTS: &str = "SELECT id FROM post WHERE site_id = $1";
    db.execute(
        &format!("DELETE FROM post_like WHERE post_id IN ({SITE_POSTS})"),
        &[&site_id],
    )
    .await?;
    db.execute(
        &format!("DELETE FROM comment WHERE post_id IN ({SITE_POSTS})"),
        &[&site_id],
    )
    .await?;
    let rows = db
        .query(
            &format!("DELETE FROM post_asset WHERE post_id IN ({SITE_POSTS}) RETURNING asset_id"),
            &[&site_id],
        )
        .await?;
    asset_ids.extend(column::<i64>(&rows, "asset_id")?);
    db.execute("DELETE FROM post WHERE site_id = $1", &[&site_id])
        .await?;

    for table in super::batch::COMPOSITION_TABLES {
        db.execute(
            &format!("DELETE FROM {table} WHERE batch_id IN (SELECT id FROM batch WHERE site_id = $1)"),
            &[&site_id],
        )
        .await?;
    }
    let rows = db
        .query(
            "DELETE FROM batch WHERE site_id = $1 RETURNING sponsor_id, image_id",
            &[&site_id],
        )
        .await?;
    let sponsor_ids: Vec<i64> = column::<Option<i64>>(&rows, "sponsor_id")?
        .into_iter()
        .flatten()
        .collect();
    asset_ids.extend(column::<Option<i64>>(&rows, "image_id")?.into_iter().flatten());
    let rows = db
        .query(
            "DELETE FROM batch_sponsor WHERE id = ANY($1) RETURNING logo_id",
            &[&sponsor_ids],
        )
        .await?;
    asset_ids.extend(column::<Option<i64>>(&rows, "logo_id")?.into_iter().flatten());

    for table in [
        "widget",
        "site_tree_species",
        "site_follower",
        "site_admin",
        "user_invitation_site",
    ] {
        db.execute(&format!("DELETE FROM {table} WHERE site_id = $1"), &[&site_id])
            .await?;
    }

    let row = db
        .query_one(
            "DELETE FROM site WHERE id = $1
             RETURNING coordinate_id, contact_id, announcement_id, image_id",
            &[&site_id],
        )
        .await?;
    let deleted: DeletedSite = from_row(&row)?;
    for (table, id) in [
        ("coordinate", deleted.coordinate_id),
        ("contact", deleted.contact_id),
        ("announcement", deleted.announcement_id),
    ] {
        if let Some(id) = id {
            db.execute(&format!("DELETE FROM {table} WHERE id = $1"), &[&id])
                .await?;
        }
    }
    asset_ids.extend(deleted.image_id);

    let paths = delete_assets(conn, &asset_ids).await?;
    tracing::info!(site_id, assets = paths.len(), "deleted site");
    Ok(Some(paths))
}
