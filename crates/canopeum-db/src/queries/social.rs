//! Posts, comments and likes.

use facet::Facet;
use jiff::Timestamp;
use tokio_postgres::types::ToSql;

use crate::model::{Comment, Post};
use crate::queries::asset::delete_assets;
use crate::{Connection, ConnectionExt, Result, from_row};

use super::{column, map_opt, map_rows};

/// Which private sites a viewer may see posts from. Public sites are always
/// visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateAccess {
    None,
    Sites(Vec<i64>),
    All,
}

impl PrivateAccess {
    fn all(&self) -> bool {
        matches!(self, PrivateAccess::All)
    }

    fn site_ids(&self) -> &[i64] {
        match self {
            PrivateAccess::Sites(ids) => ids,
            PrivateAccess::None | PrivateAccess::All => &[],
        }
    }
}

/// A post with its counters, as seen by one viewer.
#[derive(Debug, Clone, Facet)]
pub struct PostRow {
    pub id: i64,
    pub site_id: i64,
    pub body: String,
    pub share_count: i32,
    pub created_at: Timestamp,
    pub like_count: i64,
    pub comment_count: i64,
    pub has_liked: bool,
    pub site_name: String,
    pub site_image_id: Option<i64>,
}

#[derive(Debug, Clone, Facet)]
pub struct PostMedia {
    pub post_id: i64,
    pub id: i64,
    pub path: String,
}

#[derive(Debug, Clone, Facet)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub body: String,
    pub author_id: i64,
    pub author_username: String,
    pub created_at: Timestamp,
}

/// Selects `PostRow` columns; `$1` is the viewer id (or NULL).
const POST_ROW_SELECT: &str = "SELECT p.id, p.site_id, p.body, p.share_count, p.created_at,
        (SELECT COUNT(*) FROM post_like l WHERE l.post_id = p.id) AS like_count,
        (SELECT COUNT(*) FROM comment c WHERE c.post_id = p.id) AS comment_count,
        EXISTS (SELECT 1 FROM post_like l WHERE l.post_id = p.id AND l.user_id = $1) AS has_liked,
        s.name AS site_name, s.image_id AS site_image_id
     FROM post p JOIN site s ON s.id = p.site_id";

/// Feed filter over `$2` (site ids or NULL), `$3` (all private sites) and
/// `$4` (readable private site ids).
const FEED_WHERE: &str = "WHERE ($2::BIGINT[] IS NULL OR p.site_id = ANY($2))
       AND (s.is_public OR $3 OR s.id = ANY($4))";

/// `FEED_WHERE` without the viewer parameter.
const FEED_COUNT: &str = "SELECT COUNT(*) AS count FROM post p JOIN site s ON s.id = p.site_id
     WHERE ($1::BIGINT[] IS NULL OR p.site_id = ANY($1))
       AND (s.is_public OR $2 OR s.id = ANY($3))";

#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    /// Restrict to these sites.
    pub site_ids: Option<Vec<i64>>,
    pub viewer_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

/// One page of the feed, newest first, with the total number of matching
/// posts.
pub async fn feed(
    conn: &impl Connection,
    query: &FeedQuery,
    access: &PrivateAccess,
) -> Result<(i64, Vec<PostRow>)> {
    let all = access.all();
    let readable = access.site_ids();

    let count_params: [&(dyn ToSql + Sync); 3] = [&query.site_ids, &all, &readable];
    let count: i64 = conn
        .traced()
        .query_one(FEED_COUNT, &count_params)
        .await?
        .try_get("count")?;

    let page_sql = format!(
        "{POST_ROW_SELECT}
         {FEED_WHERE}
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT $5 OFFSET $6"
    );
    let rows = conn
        .traced()
        .query(
            &page_sql,
            &[
                &query.viewer_id,
                &query.site_ids,
                &all,
                &readable,
                &query.limit,
                &query.offset,
            ],
        )
        .await?;
    Ok((count, map_rows(&rows)?))
}

pub async fn post_row(conn: &impl Connection, post_id: i64, viewer_id: Option<i64>) -> Result<Option<PostRow>> {
    let sql = format!("{POST_ROW_SELECT} WHERE p.id = $2");
    let row = conn.traced().query_opt(&sql, &[&viewer_id, &post_id]).await?;
    map_opt(row)
}

/// Media of the given posts, in upload order.
pub async fn post_media(conn: &impl Connection, post_ids: &[i64]) -> Result<Vec<PostMedia>> {
    let rows = conn
        .traced()
        .query(
            "SELECT pa.post_id, a.id, a.path
             FROM post_asset pa JOIN asset a ON a.id = pa.asset_id
             WHERE pa.post_id = ANY($1)
             ORDER BY pa.post_id, a.id",
            &[&post_ids],
        )
        .await?;
    map_rows(&rows)
}

/// Create a post and attach already uploaded assets. Run inside a transaction.
pub async fn insert_post(conn: &impl Connection, site_id: i64, body: &str, media_ids: &[i64]) -> Result<Post> {
    let row = conn
        .traced()
        .query_one(
            "INSERT INTO post (site_id, body) VALUES ($1, $2)
             RETURNING id, site_id, body, share_count, created_at",
            &[&site_id, &body],
        )
        .await?;
    let post: Post = from_row(&row)?;
    if !media_ids.is_empty() {
        conn.traced()
            .execute(
                "INSERT INTO post_asset (post_id, asset_id)
                 SELECT $1::BIGINT, unnest($2::BIGINT[])",
                &[&post.id, &media_ids],
            )
            .await?;
    }
    Ok(post)
}

/// Delete a post with its likes, comments and media, returning the media
/// paths. Run inside a transaction.
pub async fn delete_post(conn: &impl Connection, id: i64) -> Result<Option<Vec<String>>> {
    let db = conn.traced();
    db.execute("DELETE FROM post_like WHERE post_id = $1", &[&id])
        .await?;
    db.execute("DELETE FROM comment WHERE post_id = $1", &[&id])
        .await?;
    let rows = db
        .query(
            "DELETE FROM post_asset WHERE post_id = $1 RETURNING asset_id",
            &[&id],
        )
        .await?;
    let asset_ids: Vec<i64> = column(&rows, "asset_id")?;
    let deleted = db.execute("DELETE FROM post WHERE id = $1", &[&id]).await?;
    if deleted == 0 {
        return Ok(None);
    }
    Ok(Some(delete_assets(conn, &asset_ids).await?))
}

const COMMENT_ROW_SELECT: &str = "SELECT c.id, c.post_id, c.body, c.user_id AS author_id,
        u.username AS author_username, c.created_at
     FROM comment c JOIN \"user\" u ON u.id = c.user_id";

/// Comments of a post, newest first.
pub async fn comments(conn: &impl Connection, post_id: i64) -> Result<Vec<CommentRow>> {
    let sql = format!("{COMMENT_ROW_SELECT} WHERE c.post_id = $1 ORDER BY c.created_at DESC, c.id DESC");
    let rows = conn.traced().query(&sql, &[&post_id]).await?;
    map_rows(&rows)
}

pub async fn insert_comment(conn: &impl Connection, post_id: i64, user_id: i64, body: &str) -> Result<CommentRow> {
    let row = conn
        .traced()
        .query_one(
            "INSERT INTO comment (post_id, user_id, body) VALUES ($1, $2, $3) RETURNING id",
            &[&post_id, &user_id, &body],
        )
        .await?;
    let id: i64 = row.try_get("id")?;
    let sql = format!("{COMMENT_ROW_SELECT} WHERE c.id = $1");
    let row = conn.traced().query_one(&sql, &[&id]).await?;
    Ok(from_row(&row)?)
}

pub async fn comment_by_id(conn: &impl Connection, post_id: i64, comment_id: i64) -> Result<Option<Comment>> {
    let row = conn
        .traced()
        .query_opt(
            "SELECT id, post_id, user_id, body, created_at FROM comment WHERE post_id = $1 AND id = $2",
            &[&post_id, &comment_id],
        )
        .await?;
    map_opt(row)
}

pub async fn delete_comment(conn: &impl Connection, comment_id: i64) -> Result<bool> {
    let deleted = conn
        .traced()
        .execute("DELETE FROM comment WHERE id = $1", &[&comment_id])
        .await?;
    Ok(deleted == 1)
}

/// Record a like. Relies on the `(user_id, post_id)` primary key, so a
/// second like fails with a unique violation on `post_like_pkey`.
pub async fn like(conn: &impl Connection, user_id: i64, post_id: i64) -> Result<()> {
    conn.traced()
        .execute(
            "INSERT INTO post_like (user_id, post_id) VALUES ($1, $2)",
            &[&user_id, &post_id],
        )
        .await?;
    Ok(())
}

/// Returns `false` if the user had not liked the post.
pub async fn unlike(conn: &impl Connection, user_id: i64, post_id: i64) -> Result<bool> {
    let deleted = conn
        .traced()
        .execute(
            "DELETE FROM post_like WHERE user_id = $1 AND post_id = $2",
            &[&user_id, &post_id],
        )
        .await?;
    Ok(deleted == 1)
}

pub async fn like_count(conn: &impl Connection, post_id: i64) -> Result<i64> {
    let row = conn
        .traced()
        .query_one(
            "SELECT COUNT(*) AS count FROM post_like WHERE post_id = $1",
            &[&post_id],
        )
        .await?;
    Ok(row.try_get("count")?)
}
