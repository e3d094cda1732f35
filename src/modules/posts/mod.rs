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

use self::models::{Post, CATEGORIES, POSTS, POST_CATEGORIES};
use self::repository::PostsRepository;
use super::openapi::{array_of, operation, path_param, query_param, schema_ref, string_props};
use super::view_slot::ViewSlot;

pub const CHANNEL: &str = "blog_changes";

/// Shared by the post routes.
pub struct PostsState {
    pub repo: PostsRepository,
    pub view: ViewSlot<Option<String>, Post>,
}

impl PostsState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            repo: PostsRepository::new(gateway),
            view: ViewSlot::empty(),
        }
    }

    /// Public listing that re-fetches whenever posts or categories change.
    pub async fn mount(&self, gateway: &Gateway) -> Result<(), DataError> {
        let repo = self.repo.clone();
        let fetch = fetcher(move |category: Option<String>| {
            let repo = repo.clone();
            async move { repo.list_published(category.as_deref()).await }
        });
        let channel = ChannelSpec::new(CHANNEL).tables([POSTS, POST_CATEGORIES, CATEGORIES]);

        self.view.mount(gateway, channel, None, fetch).await
    }

    /// A failed admin write leaves the listing re-read from the backend.
    pub async fn admin_failure(&self, err: DataError) -> AppError {
        if err.kind() != ErrorKind::Validation {
            tracing::warn!(module = "posts", error = %err, "admin write failed; resyncing");
            self.view.resync().await;
        }
        AppError::from(err)
    }
}

pub struct PostsModule {
    state: OnceCell<Arc<PostsState>>,
}

impl PostsModule {
    pub const fn new() -> Self {
        Self {
            state: OnceCell::new(),
        }
    }

    pub fn state(&self) -> Option<&Arc<PostsState>> {
        self.state.get()
    }
}

impl Default for PostsModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for PostsModule {
    fn name(&self) -> &'static str {
        "posts"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.state
            .set(Arc::new(PostsState::new(ctx.gateway.clone())))
            .map_err(|_| anyhow::anyhow!("posts module initialized twice"))?;
        tracing::info!(module = self.name(), "posts module initialized");
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
        vec![
            TableSpec::unique(POSTS, &["slug"]),
            TableSpec::unique(CATEGORIES, &["slug"]),
            TableSpec::new(POST_CATEGORIES),
        ]
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
        let tag = "Posts";
        Some(json!({
            "paths": {
                "/": {
                    "get": operation(
                        "List published posts, newest first",
                        tag,
                        vec![query_param("category", "Only posts in this category id")],
                        None,
                        ("200", Some(array_of("Post"))),
                        &[("503", "Backend unavailable")],
                    )
                },
                "/categories": {
                    "get": operation(
                        "List categories by name",
                        tag,
                        vec![],
                        None,
                        ("200", Some(array_of("Category"))),
                        &[],
                    )
                },
                "/slug/{slug}": {
                    "get": operation(
                        "Published post by slug",
                        tag,
                        vec![path_param("slug")],
                        None,
                        ("200", Some(schema_ref("Post"))),
                        &[("404", "No published post with this slug")],
                    )
                },
                "/admin": {
                    "get": operation(
                        "List every post, drafts included",
                        tag,
                        vec![],
                        None,
                        ("200", Some(array_of("Post"))),
                        &[],
                    ),
                    "post": operation(
                        "Create a post",
                        tag,
                        vec![],
                        Some("PostDraft"),
                        ("201", Some(schema_ref("Post"))),
                        &[("422", "Missing title or content"), ("409", "Duplicate slug")],
                    )
                },
                "/admin/categories": {
                    "post": operation(
                        "Create a category",
                        tag,
                        vec![],
                        Some("CategoryDraft"),
                        ("201", Some(schema_ref("Category"))),
                        &[("422", "Missing name"), ("409", "Duplicate slug")],
                    )
                },
                "/admin/{id}": {
                    "put": operation(
                        "Replace a post",
                        tag,
                        vec![path_param("id")],
                        Some("PostDraft"),
                        ("200", Some(schema_ref("Post"))),
                        &[("404", "Unknown post"), ("422", "Missing title or content")],
                    ),
                    "delete": operation(
                        "Delete a post",
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
                        ("200", Some(schema_ref("Post"))),
                        &[("404", "Unknown post")],
                    )
                }
            },
            "components": {
                "schemas": {
                    "Category": {
                        "type": "object",
                        "properties": string_props(&["id", "name", "slug"]),
                        "required": ["id", "name", "slug"]
                    },
                    "Post": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "slug": { "type": "string" },
                            "excerpt": { "type": "string" },
                            "content": { "type": "string" },
                            "cover_image": { "type": "string" },
                            "published": { "type": "boolean" },
                            "created_at": { "type": "string", "format": "date-time" },
                            "reading_time": { "type": "integer", "description": "Minutes" },
                            "categories": array_of("Category")
                        },
                        "required": ["id", "title", "slug", "content", "published", "created_at", "categories"]
                    },
                    "PostDraft": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "excerpt": { "type": "string" },
                            "content": { "type": "string" },
                            "cover_image": { "type": "string" },
                            "published": { "type": "boolean" },
                            "reading_time": { "type": "integer" },
                            "category_ids": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["title", "content"]
                    },
                    "CategoryDraft": {
                        "type": "object",
                        "properties": string_props(&["name"]),
                        "required": ["name"]
                    },
                    "PublishChange": {
                        "type": "object",
                        "properties": {
                            "published": {
                                "type": "boolean",
                                "description": "Omit to toggle the current value"
                            }
                        }
                    }
                }
            }
        }))
    }
}

/// Create a new instance of the posts module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(PostsModule::new())
}
