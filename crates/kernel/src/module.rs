use async_trait::async_trait;
use axum::Router;
use vitrina_db::{Gateway, TableSpec};

use crate::settings::Settings;

/// Context provided to modules during initialization and start.
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
    pub gateway: &'a Gateway,
}

/// Lifecycle contract every content module implements.
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module
    fn name(&self) -> &'static str;

    /// Build module state. Called once, before any routes are served.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes mounted under `/api/{module_name}`
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment merged with the other modules' documents
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Tables this module reads and writes.
    fn tables(&self) -> Vec<TableSpec> {
        vec![]
    }

    /// Mount subscriptions and other background work.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Release everything acquired in `start`.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
