use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use vitrina_http::AppError;

use super::models::{Product, ProductDraft};
use super::ProductsState;
use crate::modules::PublishChange;
use crate::utils::messages;

pub fn router(state: Arc<ProductsState>) -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/admin", get(list_all_products).post(create_product))
        .route("/admin/{id}", put(update_product).delete(delete_product))
        .route("/admin/{id}/published", patch(set_published))
        .route("/slug/{slug}", get(get_product))
        .with_state(state)
}

async fn list_products(
    State(state): State<Arc<ProductsState>>,
) -> Result<Json<Vec<Product>>, AppError> {
    if let Some(products) = state.view.ready_items() {
        return Ok(Json(products));
    }

    state
        .repo
        .list_published()
        .await
        .map(Json)
        .map_err(|err| AppError::from(err).with_message(messages::PRODUCTS_LOAD_FAILED))
}

async fn get_product(
    State(state): State<Arc<ProductsState>>,
    Path(slug): Path<String>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.repo.get_published_by_slug(&slug).await?))
}

async fn list_all_products(
    State(state): State<Arc<ProductsState>>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.repo.list_all().await?))
}

async fn create_product(
    State(state): State<Arc<ProductsState>>,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    match state.repo.create(&draft).await {
        Ok(product) => Ok((StatusCode::CREATED, Json(product))),
        Err(err) => Err(state.admin_failure(err).await),
    }
}

async fn update_product(
    State(state): State<Arc<ProductsState>>,
    Path(id): Path<String>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>, AppError> {
    match state.repo.update(&id, &draft).await {
        Ok(product) => Ok(Json(product)),
        Err(err) => Err(state.admin_failure(err).await),
    }
}

async fn delete_product(
    State(state): State<Arc<ProductsState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    match state.repo.delete(&id).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(state.admin_failure(err).await),
    }
}

async fn set_published(
    State(state): State<Arc<ProductsState>>,
    Path(id): Path<String>,
    Json(change): Json<PublishChange>,
) -> Result<Json<Product>, AppError> {
    let result = match change.published {
        Some(published) => state.repo.set_published(&id, published).await,
        None => match state.repo.get(&id).await {
            Ok(current) => state.repo.toggle_published(&current).await,
            Err(err) => Err(err),
        },
    };

    match result {
        Ok(product) => Ok(Json(product)),
        Err(err) => Err(state.admin_failure(err).await),
    }
}
