use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    error::AppError,
    models::{Liked, NewPost, PostId, UserId},
    state::AppState,
    utils::{CurrentUser, now_millis, ok, today},
};

type Shared = State<Arc<AppState>>;

#[derive(Deserialize)]
pub struct PageQuery {
    current: Option<usize>,
}

#[derive(Deserialize)]
pub struct AuthorQuery {
    id: UserId,
    current: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollQuery {
    last_id: Option<i64>,
    offset: Option<usize>,
}

pub async fn save_blog_handler(
    State(state): Shared,
    CurrentUser(user_id): CurrentUser,
    Json(new_post): Json<NewPost>,
) -> Result<impl IntoResponse, AppError> {
    let id = state.blogs.publish(user_id, new_post, Utc::now()).await?;

    Ok(ok(id))
}

pub async fn blog_handler(
    State(state): Shared,
    viewer: Option<CurrentUser>,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.blogs.detail(id, viewer.map(|v| v.0)).await?;

    Ok(ok(view))
}

pub async fn like_handler(
    State(state): Shared,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse, AppError> {
    let liked = state
        .blogs
        .ledger
        .toggle_like(id, user_id, now_millis())
        .await?;

    Ok(ok(Liked { liked }))
}

pub async fn likers_handler(
    State(state): Shared,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse, AppError> {
    let likers = state
        .blogs
        .ledger
        .top_likers(id, state.config.likers_limit)
        .await?;

    Ok(ok(likers))
}

pub async fn reconcile_handler(
    State(state): Shared,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse, AppError> {
    let liked = state.blogs.ledger.reconcile(id).await?;

    Ok(ok(liked))
}

pub async fn hot_handler(
    State(state): Shared,
    viewer: Option<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let posts = state
        .blogs
        .hot(
            query.current.unwrap_or(1),
            state.config.max_page_size,
            viewer.map(|v| v.0),
        )
        .await?;

    Ok(ok(posts))
}

pub async fn author_handler(
    State(state): Shared,
    Query(query): Query<AuthorQuery>,
) -> Result<impl IntoResponse, AppError> {
    let posts = state
        .blogs
        .by_author(
            query.id,
            query.current.unwrap_or(1),
            state.config.max_page_size,
        )
        .await?;

    Ok(ok(posts))
}

pub async fn follow_feed_handler(
    State(state): Shared,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ScrollQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .blogs
        .follow_feed(
            user_id,
            query.last_id,
            query.offset.unwrap_or(0),
            state.config.feed_page_size,
        )
        .await?;

    Ok(ok(page))
}

pub async fn follow_handler(
    State(state): Shared,
    CurrentUser(user_id): CurrentUser,
    Path((author_id, is_follow)): Path<(UserId, bool)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .blogs
        .set_following(user_id, author_id, is_follow)
        .await?;

    Ok(ok(is_follow))
}

pub async fn is_following_handler(
    State(state): Shared,
    CurrentUser(user_id): CurrentUser,
    Path(author_id): Path<UserId>,
) -> Result<impl IntoResponse, AppError> {
    let following = state.blogs.is_following(user_id, author_id).await?;

    Ok(ok(following))
}

pub async fn sign_handler(
    State(state): Shared,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let first_today = state.attendance.mark_present(user_id, today()).await?;

    Ok(ok(first_today))
}

pub async fn sign_count_handler(
    State(state): Shared,
    CurrentUser(user_id): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let streak = state.attendance.current_streak(user_id, today()).await?;

    Ok(ok(streak))
}
