//! Services offered on the site (talks, mentoring, workshops).
//!
//! Public reads list services by `order_index` and show a detail page with
//! ready-made contact copy. Icons are a closed set; a stored name outside
//! the set renders as the default icon.

pub mod models;
pub mod repository;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use once_cell::sync::OnceCell;
use serde_json::json;
use vitrina_db::{fetcher, ChannelSpec, DataError, ErrorKind, Gateway, TableSpec};
use vitrina_http::AppError;
use vitrina_kernel::{InitCtx, Module};

use self::models::{Service, ServiceIcon, SERVICES};
use self::repository::ServicesRepository;
use super::openapi::{array_of, operation, path_param, schema_ref};
use super::view_slot::ViewSlot;

pub const CHANNEL: &str = "services_changes";

pub struct ServicesState {
    pub repo: ServicesRepository,
    pub view: ViewSlot<(), Service>,
}

impl ServicesState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            repo: ServicesRepository::new(gateway),
            view: ViewSlot::empty(),
        }
    }

    pub async fn mount(&self, gateway: &Gateway) -> Result<(), DataError> {
        let repo = self.repo.clone();
        let fetch = fetcher(move |()| {
            let repo = repo.clone();
            async move { repo.list().await }
        });
        let channel = ChannelSpec::new(CHANNEL).tables([SERVICES]);

        self.view.mount(gateway, channel, (), fetch).await
    }

    pub async fn admin_failure(&self, err: DataError) -> AppError {
        if err.kind() != ErrorKind::Validation {
            tracing::warn!(module = "services", error = %err, "admin write failed; resyncing");
            self.view.resync().await;
        }
        AppError::from(err)
    }
}

pub struct ServicesModule {
    state: OnceCell<Arc<ServicesState>>,
}

impl ServicesModule {
    pub const fn new() -> Self {
        Self {
            state: OnceCell::new(),
        }
    }

    pub fn state(&self) -> Option<&Arc<ServicesState>> {
        self.state.get()
    }
}

impl Default for ServicesModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for ServicesModule {
    fn name(&self) -> &'static str {
        "services"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.state
            .set(Arc::new(ServicesState::new(ctx.gateway.clone())))
            .map_err(|_| anyhow::anyhow!("services module initialized twice"))?;
        tracing::info!(module = self.name(), "services module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.state.get() {
            Some(state) => routes::router(state.clone()),
            None => {
                tracing::warn!(module = self.name(), "routes requested before init");
                Router::new()
            }
        }
    }

    fn tables(&self) -> Vec<TableSpec> {
        vec![TableSpec::new(SERVICES)]
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if let Some(state) = self.state.get() {
            state.mount(ctx.gateway).await?;
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        if let Some(state) = self.state.get() {
            state.view.release();
        }
        Ok(())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let tag = "Services";
        let icons: Vec<&str> = ServiceIcon::ALL.iter().map(|icon| icon.as_str()).collect();
        Some(json!({
            "paths": {
                "/": {
                    "get": operation(
                        "List services by display order",
                        tag,
                        vec![],
                        None,
                        ("200", Some(array_of("Service"))),
                        &[("503", "Backend unavailable; retry later")],
                    )
                },
                "/{id}": {
                    "get": operation(
                        "Service detail with contact copy",
                        tag,
                        vec![path_param("id")],
                        None,
                        ("200", Some(schema_ref("ServiceDetail"))),
                        &[("404", "Unknown service")],
                    )
                },
                "/admin": {
                    "post": operation(
                        "Create a service",
                        tag,
                        vec![],
                        Some("ServiceDraft"),
                        ("201", Some(schema_ref("Service"))),
                        &[("422", "Missing text or unknown icon")],
                    )
                },
                "/admin/{id}": {
                    "put": operation(
                        "Replace a service",
                        tag,
                        vec![path_param("id")],
                        Some("ServiceDraft"),
                        ("200", Some(schema_ref("Service"))),
                        &[("404", "Unknown service"), ("422", "Missing text or unknown icon")],
                    ),
                    "delete": operation(
                        "Delete a service",
                        tag,
                        vec![path_param("id")],
                        None,
                        ("204", None),
                        &[],
                    )
                }
            },
            "components": {
                "schemas": {
                    "ServiceIcon": { "type": "string", "enum": icons },
                    "Service": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "content": { "type": "string" },
                            "icon": { "type": "string" },
                            "youtube_url": { "type": ["string", "null"] },
                            "order_index": { "type": "integer" }
                        },
                        "required": ["id", "title", "order_index"]
                    },
                    "ServiceDetail": {
                        "allOf": [
                            schema_ref("Service"),
                            {
                                "type": "object",
                                "properties": {
                                    "resolved_icon": schema_ref("ServiceIcon"),
                                    "contact_message": { "type": "string" },
                                    "appointment_subject": { "type": "string" },
                                    "appointment_body": { "type": "string" }
                                }
                            }
                        ]
                    },
                    "ServiceDraft": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "content": { "type": "string" },
                            "icon": schema_ref("ServiceIcon"),
                            "youtube_url": { "type": "string" },
                            "order_index": { "type": "integer" }
                        },
                        "required": ["title", "description"]
                    }
                }
            }
        }))
    }
}

pub fn create_module() -> Arc<dyn Module> {
    Arc::new(ServicesModule::new())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;
    use vitrina_db::{MemoryBackend, RetryPolicy};
    use vitrina_kernel::settings::Settings;

    use super::*;
    use crate::utils::messages;

    async fn started() -> (ServicesModule, Arc<MemoryBackend>) {
        let module = ServicesModule::new();
        let backend = Arc::new(MemoryBackend::with_tables(&module.tables()));
        let gateway = Gateway::new(backend.clone(), RetryPolicy::new(2, 1, 5));
        let settings = Settings::default();
        let ctx = InitCtx {
            settings: &settings,
            gateway: &gateway,
        };
        module.init(&ctx).await.unwrap();
        module.start(&ctx).await.unwrap();
        (module, backend)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn detail_includes_contact_copy() {
        let (module, _) = started().await;
        let (status, created) = send(
            module.routes(),
            post_json(
                "/admin",
                json!({ "title": "Conferencias", "description": "Charlas", "icon": "Mic" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let id = created["id"].as_str().unwrap();
        let (status, detail) = send(module.routes(), get(&format!("/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["resolved_icon"], "Mic");
        assert_eq!(detail["appointment_subject"], "Solicitud de cita: Conferencias");
        assert_eq!(detail["contact_message"], messages::service_inquiry("Conferencias"));
    }

    #[tokio::test]
    async fn unknown_icon_is_unprocessable() {
        let (module, _) = started().await;
        let (status, body) = send(
            module.routes(),
            post_json(
                "/admin",
                json!({ "title": "Cohetes", "description": "d", "icon": "Rocket" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["message"], messages::UNKNOWN_ICON);
        assert_eq!(body["error"]["details"][0]["field"], "icon");
    }

    #[tokio::test]
    async fn listing_failure_carries_retry_hint() {
        let (module, backend) = started().await;
        module.state().unwrap().view.release();
        backend.fail_next(3);

        let (status, body) = send(module.routes(), get("/")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["message"], messages::SERVICES_LOAD_FAILED);
        let details = body["error"]["details"].as_array().unwrap();
        assert!(details.iter().any(|d| d["retry"] == true));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (module, _) = started().await;
        let (status, _) = send(module.routes(), get("/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
