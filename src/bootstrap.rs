//! Wiring shared by the server binary and the CLI.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use vitrina_db::{Gateway, MemoryBackend, PostgrestBackend, TableBackend, TableSpec};
use vitrina_kernel::settings::{BackendKind, Settings};
use vitrina_kernel::{InitCtx, ModuleRegistry};

use crate::modules;

/// Build the one gateway the process uses, against the configured backend.
pub fn connect(settings: &Settings, tables: &[TableSpec]) -> anyhow::Result<Gateway> {
    let backend: Arc<dyn TableBackend> = match settings.backend.kind {
        BackendKind::Memory => {
            tracing::warn!("using the in-memory backend; content is lost on exit");
            Arc::new(MemoryBackend::with_tables(tables))
        }
        BackendKind::Postgrest => {
            let url = settings
                .backend
                .url
                .as_deref()
                .context("backend.url is required when backend.kind = \"postgrest\"")?;
            let client = PostgrestBackend::new(
                url,
                settings.backend.api_key.clone(),
                settings.backend.request_timeout(),
            )
            .context("failed to create table API client")?;
            Arc::new(client)
        }
    };

    Ok(Gateway::new(backend, settings.retry.policy()))
}

/// Registered and initialised modules plus the gateway they share.
pub struct App {
    pub settings: Settings,
    pub registry: ModuleRegistry,
    pub gateway: Gateway,
}

impl App {
    /// Register every content module, connect, and run `init`.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry)?;

        let gateway = connect(&settings, &registry.collect_tables())?;
        Self::with_gateway(settings, registry, gateway).await
    }

    /// Like [`App::build`] but over an existing gateway.
    pub async fn with_gateway(
        settings: Settings,
        registry: ModuleRegistry,
        gateway: Gateway,
    ) -> anyhow::Result<Self> {
        let ctx = InitCtx {
            settings: &settings,
            gateway: &gateway,
        };
        registry.init_all(&ctx).await?;

        Ok(Self {
            settings,
            registry,
            gateway,
        })
    }

    /// Mount live views and other background work.
    pub async fn start(&self) -> anyhow::Result<()> {
        let ctx = InitCtx {
            settings: &self.settings,
            gateway: &self.gateway,
        };
        self.registry.start_all(&ctx).await
    }

    pub fn router(&self) -> Router {
        vitrina_http::build_router(&self.registry, &self.settings)
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.registry.stop_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrina_kernel::settings::BackendSettings;

    #[test]
    fn postgrest_backend_needs_a_url() {
        let settings = Settings {
            backend: BackendSettings {
                kind: BackendKind::Postgrest,
                ..BackendSettings::default()
            },
            ..Settings::default()
        };
        let err = connect(&settings, &[]).unwrap_err();
        assert!(err.to_string().contains("backend.url"));
    }

    #[test]
    fn defaults_connect_to_memory() {
        let gateway = connect(&Settings::default(), &[]).unwrap();
        assert_eq!(gateway.backend_name(), "memory");
    }

    #[tokio::test]
    async fn builds_and_stops_every_module() {
        let app = App::build(Settings::default()).await.unwrap();
        app.start().await.unwrap();
        assert_eq!(app.registry.module_count(), 3);
        assert!(app.gateway.changes().is_active("blog_changes"));

        app.stop().await.unwrap();
        assert_eq!(app.gateway.changes().active_channels(), 0);
    }
}
