use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use vitrina_db::DataError;
use vitrina_http::AppError;

use super::models::{Category, CategoryDraft, Post, PostDraft};
use super::PostsState;
use crate::modules::PublishChange;
use crate::utils::messages;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Category id; blank means every category.
    pub category: Option<String>,
}

pub fn router(state: Arc<PostsState>) -> Router {
    Router::new()
        .route("/", get(list_posts))
        .route("/categories", get(list_categories))
        .route("/admin", get(list_all_posts).post(create_post))
        .route("/admin/categories", post(create_category))
        .route("/admin/{id}", put(update_post).delete(delete_post))
        .route("/admin/{id}/published", patch(set_published))
        .route("/slug/{slug}", get(get_post))
        .with_state(state)
}

fn load_failed(err: DataError) -> AppError {
    AppError::from(err).with_message(messages::POSTS_LOAD_FAILED)
}

async fn list_posts(
    State(state): State<Arc<PostsState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Post>>, AppError> {
    let category = params.category.filter(|c| !c.trim().is_empty());

    if category.is_none() {
        if let Some(posts) = state.view.ready_items() {
            return Ok(Json(posts));
        }
    }

    state
        .repo
        .list_published(category.as_deref())
        .await
        .map(Json)
        .map_err(load_failed)
}

async fn list_categories(
    State(state): State<Arc<PostsState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.repo.list_categories().await?))
}

async fn get_post(
    State(state): State<Arc<PostsState>>,
    Path(slug): Path<String>,
) -> Result<Json<Post>, AppError> {
    Ok(Json(state.repo.get_published_by_slug(&slug).await?))
}

async fn list_all_posts(State(state): State<Arc<PostsState>>) -> Result<Json<Vec<Post>>, AppError> {
    Ok(Json(state.repo.list_all().await?))
}

async fn create_post(
    State(state): State<Arc<PostsState>>,
    Json(draft): Json<PostDraft>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    match state.repo.create(&draft).await {
        Ok(post) => Ok((StatusCode::CREATED, Json(post))),
        Err(err) => Err(state.admin_failure(err).await),
    }
}

async fn update_post(
    State(state): State<Arc<PostsState>>,
    Path(id): Path<String>,
    Json(draft): Json<PostDraft>,
) -> Result<Json<Post>, AppError> {
    match state.repo.update(&id, &draft).await {
        Ok(post) => Ok(Json(post)),
        Err(err) => Err(state.admin_failure(err).await),
    }
}

async fn delete_post(
    State(state): State<Arc<PostsState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    match state.repo.delete(&id).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(state.admin_failure(err).await),
    }
}

/// Explicit value, or a toggle when the body omits `published`.
async fn set_published(
    State(state): State<Arc<PostsState>>,
    Path(id): Path<String>,
    Json(change): Json<PublishChange>,
) -> Result<Json<Post>, AppError> {
    let result = match change.published {
        Some(published) => state.repo.set_published(&id, published).await,
        None => match state.repo.get(&id).await {
            Ok(current) => state.repo.toggle_published(&current).await,
            Err(err) => Err(err),
        },
    };

    match result {
        Ok(post) => Ok(Json(post)),
        Err(err) => Err(state.admin_failure(err).await),
    }
}

async fn create_category(
    State(state): State<Arc<PostsState>>,
    Json(draft): Json<CategoryDraft>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    match state.repo.create_category(&draft).await {
        Ok(category) => Ok((StatusCode::CREATED, Json(category))),
        Err(err) => Err(state.admin_failure(err).await),
    }
}
