use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use canopeum::permission::can_delete_comment;
use canopeum::{Actor, Page, PageRequest};
use canopeum_db::{Connection, DbError};
use canopeum_db::queries::site::{
    ContactUpdate, delete_widget as remove_widget, follow, insert_widget, is_site_admin,
    set_public, unfollow, update_announcement, update_contact, update_widget, widgets,
};
use canopeum_db::queries::social::{
    FeedQuery, comment_by_id, comments, delete_comment as remove_comment,
    delete_post as remove_post, feed, insert_comment, insert_post, like, like_count, post_row,
    unlike,
};
use serde::{Deserialize, Serialize};

use super::{JsonBody, QueryParams, managed_site, private_access, readable_site, required};
use crate::auth::{AuthUser, MaybeUser};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::state::AppState;
use crate::views::site::{AnnouncementView, ContactView};
use crate::views::social::{CommentView, PostView, SiteSocialView, WidgetView};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/social/sites/:id", get(site_page))
        .route("/social/sites/:id/public-status", patch(public_status))
        .route(
            "/social/sites/:id/followers",
            post(follow_site).delete(unfollow_site),
        )
        .route("/social/sites/:id/announcements", patch(patch_announcement))
        .route(
            "/social/sites/:id/contacts/:contact_id",
            patch(patch_contact),
        )
        .route(
            "/social/sites/:id/widgets",
            get(list_widgets).post(create_widget),
        )
        .route(
            "/social/sites/:id/widgets/:widget_id",
            patch(patch_widget).delete(delete_widget),
        )
        .route("/social/posts", get(list_posts).post(create_post))
        .route("/social/posts/:id", get(post_detail).delete(delete_post))
        .route(
            "/social/posts/:id/comments",
            get(list_comments).post(create_comment),
        )
        .route(
            "/social/posts/:id/comments/:comment_id",
            delete(delete_comment),
        )
        .route("/social/posts/:id/likes", post(like_post).delete(unlike_post))
}

async fn site_page(
    State(state): State<AppState>,
    MaybeUser(actor): MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SiteSocialView>> {
    let conn = state.db.get().await?;
    let site = readable_site(&conn, actor.as_ref(), id).await?;
    Ok(Json(SiteSocialView::load(&conn, &state.media, site).await?))
}

#[derive(Debug, Deserialize)]
struct PublicStatus {
    is_public: bool,
}

async fn public_status(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<PublicStatus>,
) -> ApiResult<Json<SiteSocialView>> {
    let conn = state.db.get().await?;
    managed_site(&conn, &actor, id).await?;
    let site = set_public(&conn, id, body.is_public)
        .await?
        .ok_or(ApiError::NotFound)?;
    tracing::info!(site_id = id, is_public = body.is_public, by = actor.user_id, "site visibility changed");
    Ok(Json(SiteSocialView::load(&conn, &state.media, site).await?))
}

async fn follow_site(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let conn = state.db.get().await?;
    readable_site(&conn, Some(&actor), id).await?;
    if !follow(&conn, actor.user_id, id).await? {
        return Err(ApiError::Conflict("ALREADY_FOLLOWING"));
    }
    Ok(StatusCode::CREATED)
}

async fn unfollow_site(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let conn = state.db.get().await?;
    if !unfollow(&conn, actor.user_id, id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnnouncementRequest {
    body: Option<String>,
    link: Option<String>,
}

async fn patch_announcement(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<AnnouncementRequest>,
) -> ApiResult<Json<AnnouncementView>> {
    let conn = state.db.get().await?;
    managed_site(&conn, &actor, id).await?;
    let announcement = update_announcement(&conn, id, body.body.as_deref(), body.link.as_deref())
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(announcement.into()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContactRequest {
    address: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    facebook_link: Option<String>,
    x_link: Option<String>,
    instagram_link: Option<String>,
    linkedin_link: Option<String>,
}

async fn patch_contact(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path((id, contact_id)): Path<(i64, i64)>,
    JsonBody(body): JsonBody<ContactRequest>,
) -> ApiResult<Json<ContactView>> {
    let conn = state.db.get().await?;
    let site = managed_site(&conn, &actor, id).await?;
    if site.contact_id != Some(contact_id) {
        return Err(ApiError::NotFound);
    }
    let update = ContactUpdate {
        address: body.address,
        email: body.email,
        phone: body.phone,
        facebook_link: body.facebook_link,
        x_link: body.x_link,
        instagram_link: body.instagram_link,
        linkedin_link: body.linkedin_link,
    };
    let contact = update_contact(&conn, id, contact_id, &update)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(contact.into()))
}

async fn list_widgets(
    State(state): State<AppState>,
    MaybeUser(actor): MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<WidgetView>>> {
    let conn = state.db.get().await?;
    readable_site(&conn, actor.as_ref(), id).await?;
    let items = widgets(&conn, id).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
struct WidgetRequest {
    title: String,
    body: String,
}

async fn create_widget(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<WidgetRequest>,
) -> ApiResult<(StatusCode, Json<WidgetView>)> {
    let mut errors = FieldErrors::new();
    required(&mut errors, "title", &body.title);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let conn = state.db.get().await?;
    managed_site(&conn, &actor, id).await?;
    let widget = insert_widget(&conn, id, &body.title, &body.body).await?;
    Ok((StatusCode::CREATED, Json(widget.into())))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WidgetPatch {
    title: Option<String>,
    body: Option<String>,
}

async fn patch_widget(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path((id, widget_id)): Path<(i64, i64)>,
    JsonBody(body): JsonBody<WidgetPatch>,
) -> ApiResult<Json<WidgetView>> {
    let conn = state.db.get().await?;
    managed_site(&conn, &actor, id).await?;
    let widget = update_widget(&conn, id, widget_id, body.title.as_deref(), body.body.as_deref())
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(widget.into()))
}

async fn delete_widget(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path((id, widget_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let conn = state.db.get().await?;
    managed_site(&conn, &actor, id).await?;
    if !remove_widget(&conn, id, widget_id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct FeedParams {
    #[serde(rename = "siteId")]
    site_id: Option<i64>,
    page: Option<u32>,
    size: Option<u32>,
}

async fn list_posts(
    State(state): State<AppState>,
    MaybeUser(actor): MaybeUser,
    QueryParams(params): QueryParams<FeedParams>,
) -> ApiResult<Json<Page<PostView>>> {
    let conn = state.db.get().await?;
    if let Some(site_id) = params.site_id {
        readable_site(&conn, actor.as_ref(), site_id).await?;
    }
    let access = private_access(&conn, actor.as_ref()).await?;

    let request = PageRequest {
        page: params.page,
        size: params.size,
    };
    let query = FeedQuery {
        site_ids: params.site_id.map(|id| vec![id]),
        viewer_id: actor.map(|actor| actor.user_id),
        limit: request.limit(),
        offset: request.offset(),
    };
    let (count, rows) = feed(&conn, &query, &access).await?;
    let views = PostView::load_all(&conn, &state.media, rows).await?;

    let filters: Vec<(&str, String)> = params
        .site_id
        .map(|id| ("siteId", id.to_string()))
        .into_iter()
        .collect();
    Ok(Json(Page::new(
        request,
        count,
        views,
        &state.public_url("/social/posts"),
        &filters,
    )))
}

#[derive(Debug, Deserialize)]
struct PostRequest {
    site_id: i64,
    body: String,
    #[serde(default)]
    media_ids: Vec<i64>,
}

async fn create_post(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<PostRequest>,
) -> ApiResult<(StatusCode, Json<PostView>)> {
    let mut errors = FieldErrors::new();
    required(&mut errors, "body", &body.body);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let mut conn = state.db.get().await?;
    managed_site(&conn, &actor, body.site_id).await?;

    let tx = conn.transaction().await.map_err(DbError::from)?;
    let post = insert_post(&tx, body.site_id, &body.body, &body.media_ids).await?;
    tx.commit().await.map_err(DbError::from)?;
    tracing::info!(post_id = post.id, site_id = post.site_id, by = actor.user_id, "post created");

    let row = post_row(&conn, post.id, Some(actor.user_id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok((
        StatusCode::CREATED,
        Json(PostView::load(&conn, &state.media, row).await?),
    ))
}

async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(actor): MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<PostView>> {
    let conn = state.db.get().await?;
    let row = post_row(&conn, id, actor.map(|actor| actor.user_id))
        .await?
        .ok_or(ApiError::NotFound)?;
    readable_site(&conn, actor.as_ref(), row.site_id).await?;
    Ok(Json(PostView::load(&conn, &state.media, row).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut conn = state.db.get().await?;
    let row = post_row(&conn, id, None).await?.ok_or(ApiError::NotFound)?;
    managed_site(&conn, &actor, row.site_id).await?;

    let tx = conn.transaction().await.map_err(DbError::from)?;
    let paths = remove_post(&tx, id).await?.ok_or(ApiError::NotFound)?;
    tx.commit().await.map_err(DbError::from)?;
    tracing::info!(post_id = id, by = actor.user_id, "post deleted");

    state.media.remove_all(&paths).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Site id of a post the actor may read.
async fn readable_post(
    conn: &impl Connection,
    actor: Option<&Actor>,
    post_id: i64,
) -> ApiResult<i64> {
    let row = post_row(conn, post_id, None)
        .await?
        .ok_or(ApiError::NotFound)?;
    readable_site(conn, actor, row.site_id).await?;
    Ok(row.site_id)
}

async fn list_comments(
    State(state): State<AppState>,
    MaybeUser(actor): MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<CommentView>>> {
    let conn = state.db.get().await?;
    readable_post(&conn, actor.as_ref(), id).await?;
    let rows = comments(&conn, id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    body: String,
}

async fn create_comment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<CommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentView>)> {
    let mut errors = FieldErrors::new();
    required(&mut errors, "body", &body.body);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let conn = state.db.get().await?;
    readable_post(&conn, Some(&actor), id).await?;
    let comment = insert_comment(&conn, id, actor.user_id, &body.body).await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path((id, comment_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let conn = state.db.get().await?;
    let site_id = readable_post(&conn, Some(&actor), id).await?;
    let comment = comment_by_id(&conn, id, comment_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let is_admin = is_site_admin(&conn, actor.user_id, site_id).await?;
    if !can_delete_comment(&actor, comment.user_id, is_admin) {
        return Err(ApiError::Forbidden);
    }
    if !remove_comment(&conn, comment.id).await? {
        return Err(ApiError::NotFound);
    }
    tracing::info!(comment_id, post_id = id, by = actor.user_id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct LikeCount {
    like_count: i64,
}

async fn like_post(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<(StatusCode, Json<LikeCount>)> {
    let conn = state.db.get().await?;
    readable_post(&conn, Some(&actor), id).await?;
    like(&conn, actor.user_id, id).await?;
    let like_count = like_count(&conn, id).await?;
    Ok((StatusCode::CREATED, Json(LikeCount { like_count })))
}

async fn unlike_post(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let conn = state.db.get().await?;
    readable_post(&conn, Some(&actor), id).await?;
    if !unlike(&conn, actor.user_id, id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
