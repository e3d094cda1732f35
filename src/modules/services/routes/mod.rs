use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use vitrina_http::AppError;

use super::models::{Service, ServiceDetail, ServiceDraft};
use super::ServicesState;
use crate::utils::messages;

pub fn router(state: Arc<ServicesState>) -> Router {
    Router::new()
        .route("/", get(list_services))
        .route("/admin", post(create_service))
        .route("/admin/{id}", put(update_service).delete(delete_service))
        .route("/{id}", get(get_service))
        .with_state(state)
}

async fn list_services(
    State(state): State<Arc<ServicesState>>,
) -> Result<Json<Vec<Service>>, AppError> {
    if let Some(services) = state.view.ready_items() {
        return Ok(Json(services));
    }

    state.repo.list().await.map(Json).map_err(|err| {
        AppError::from(err)
            .with_message(messages::SERVICES_LOAD_FAILED)
            .with_detail(json!({ "retry": true }))
    })
}

async fn get_service(
    State(state): State<Arc<ServicesState>>,
    Path(id): Path<String>,
) -> Result<Json<ServiceDetail>, AppError> {
    let service = state.repo.get(&id).await?;
    Ok(Json(ServiceDetail::from(service)))
}

async fn create_service(
    State(state): State<Arc<ServicesState>>,
    Json(draft): Json<ServiceDraft>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    match state.repo.create(&draft).await {
        Ok(service) => Ok((StatusCode::CREATED, Json(service))),
        Err(err) => Err(state.admin_failure(err).await),
    }
}

async fn update_service(
    State(state): State<Arc<ServicesState>>,
    Path(id): Path<String>,
    Json(draft): Json<ServiceDraft>,
) -> Result<Json<Service>, AppError> {
    match state.repo.update(&id, &draft).await {
        Ok(service) => Ok(Json(service)),
        Err(err) => Err(state.admin_failure(err).await),
    }
}

async fn delete_service(
    State(state): State<Arc<ServicesState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    match state.repo.delete(&id).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(state.admin_failure(err).await),
    }
}
