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

use self::models::{Product, PRODUCTS};
use self::repository::ProductsRepository;
use super::openapi::{array_of, operation, path_param, schema_ref, string_props};
use super::view_slot::ViewSlot;

pub const CHANNEL: &str = "products_changes";

pub struct ProductsState {
    pub repo: ProductsRepository,
    pub view: ViewSlot<(), Product>,
}

impl ProductsState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            repo: ProductsRepository::new(gateway),
            view: ViewSlot::empty(),
        }
    }

    pub async fn mount(&self, gateway: &Gateway) -> Result<(), DataError> {
        let repo = self.repo.clone();
        let fetch = fetcher(move |()| {
            let repo = repo.clone();
            async move { repo.list_published().await }
        });
        let channel = ChannelSpec::new(CHANNEL).tables([PRODUCTS]);

        self.view.mount(gateway, channel, (), fetch).await
    }

    pub async fn admin_failure(&self, err: DataError) -> AppError {
        if err.kind() != ErrorKind::Validation {
            tracing::warn!(module = "products", error = %err, "admin write failed; resyncing");
            self.view.resync().await;
        }
        AppError::from(err)
    }
}

pub struct ProductsModule {
    state: OnceCell<Arc<ProductsState>>,
}

impl ProductsModule {
    pub const fn new() -> Self {
        Self {
            state: OnceCell::new(),
        }
    }

    pub fn state(&self) -> Option<&Arc<ProductsState>> {
        self.state.get()
    }
}

impl Default for ProductsModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for ProductsModule {
    fn name(&self) -> &'static str {
        "products"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.state
            .set(Arc::new(ProductsState::new(ctx.gateway.clone())))
            .map_err(|_| anyhow::anyhow!("products module initialized twice"))?;
        tracing::info!(module = self.name(), "products module initialized");
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
        vec![TableSpec::unique(PRODUCTS, &["slug"])]
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
        let tag = "Products";
        Some(json!({
            "paths": {
                "/": {
                    "get": operation(
                        "List published products, newest first",
                        tag,
                        vec![],
                        None,
                        ("200", Some(array_of("Product"))),
                        &[("503", "Backend unavailable")],
                    )
                },
                "/slug/{slug}": {
                    "get": operation(
                        "Published product by slug",
                        tag,
                        vec![path_param("slug")],
                        None,
                        ("200", Some(schema_ref("Product"))),
                        &[("404", "No published product with this slug")],
                    )
                },
                "/admin": {
                    "get": operation(
                        "List every product, drafts included",
                        tag,
                        vec![],
                        None,
                        ("200", Some(array_of("Product"))),
                        &[],
                    ),
                    "post": operation(
                        "Create a product",
                        tag,
                        vec![],
                        Some("ProductDraft"),
                        ("201", Some(schema_ref("Product"))),
                        &[("422", "Missing image, text, or edition URL"), ("409", "Duplicate slug")],
                    )
                },
                "/admin/{id}": {
                    "put": operation(
                        "Replace a product",
                        tag,
                        vec![path_param("id")],
                        Some("ProductDraft"),
                        ("200", Some(schema_ref("Product"))),
                        &[("404", "Unknown product"), ("422", "Invalid product")],
                    ),
                    "delete": operation(
                        "Delete a product",
                        tag,
                        vec![path_param("id")],
                        None,
                        ("204", None),
                        &[],
                    )
                },
                "/admin/{id}/published": {
                    "patch": operation(
                        "Set or toggle the publish flag",
                        tag,
                        vec![path_param("id")],
                        Some("PublishChange"),
                        ("200", Some(schema_ref("Product"))),
                        &[("404", "Unknown product")],
                    )
                }
            },
            "components": {
                "schemas": {
                    "Product": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "slug": { "type": "string" },
                            "description": { "type": "string" },
                            "image_url": { "type": "string" },
                            "ebook_url": { "type": ["string", "null"] },
                            "physical_url": { "type": ["string", "null"] },
                            "published": { "type": "boolean" },
                            "created_at": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "title", "slug", "published", "created_at"]
                    },
                    "ProductDraft": {
                        "type": "object",
                        "properties": string_props(&[
                            "title",
                            "description",
                            "image_url",
                            "ebook_url",
                            "physical_url"
                        ]),
                        "required": ["title", "description", "image_url"]
                    }
                }
            }
        }))
    }
}

pub fn create_module() -> Arc<dyn Module> {
    Arc::new(ProductsModule::new())
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

    async fn started() -> (ProductsModule, Arc<MemoryBackend>) {
        let module = ProductsModule::new();
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

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn product_without_edition_url_is_rejected() {
        let (module, backend) = started().await;
        let calls = backend.calls();

        let (status, body) = send(
            module.routes(),
            post_json(
                "/admin",
                json!({
                    "title": "Libro",
                    "description": "Sin enlaces",
                    "image_url": "https://cdn.example.com/l.jpg",
                    "ebook_url": ""
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["message"], messages::EDITION_URL_REQUIRED);
        assert_eq!(backend.calls(), calls);
    }

    #[tokio::test]
    async fn duplicate_slug_is_conflict() {
        let (module, _) = started().await;
        let product = json!({
            "title": "Mismo título",
            "description": "d",
            "image_url": "https://cdn.example.com/m.jpg",
            "ebook_url": "https://tienda.example.com/m",
            "published": true
        });

        let (status, _) = send(module.routes(), post_json("/admin", product.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(module.routes(), post_json("/admin", product)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["details"][0]["backend_code"], "23505");
        assert_eq!(
            module.state().unwrap().view.state(),
            Some(vitrina_db::ViewState::Ready)
        );
    }

    #[tokio::test]
    async fn listing_failure_uses_localized_message() {
        let (module, backend) = started().await;
        module.state().unwrap().view.release();
        backend.fail_next(3);

        let (status, body) = send(
            module.routes(),
            Request::builder().uri("/").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["message"], messages::PRODUCTS_LOAD_FAILED);
    }

    #[tokio::test]
    async fn slug_route_does_not_shadow_admin_listing() {
        let (module, _) = started().await;
        let (status, created) = send(
            module.routes(),
            post_json(
                "/admin",
                json!({
                    "title": "Admin",
                    "description": "d",
                    "image_url": "https://cdn.example.com/a.jpg",
                    "physical_url": "https://tienda.example.com/a",
                    "published": true
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, product) = send(module.routes(), get("/slug/admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(product["id"], created["id"]);

        let (status, all) = send(module.routes(), get("/admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 1);
    }
}
