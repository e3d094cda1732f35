use anyhow::Context;
use vitrina_app::App;
use vitrina_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load Vitrina settings")?;
    vitrina_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        backend = ?settings.backend.kind,
        "vitrina starting"
    );

    let app = App::build(settings).await?;
    app.start().await?;

    let served = vitrina_http::start_server(
        &app.registry,
        &app.settings,
        vitrina_http::shutdown_signal(),
    )
    .await;

    app.stop().await?;
    served
}
