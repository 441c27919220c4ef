use std::sync::Arc;

use atrium_api::app;
use atrium_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    atrium_observability::init();

    let config = AppConfig::from_env()?;
    let services = Arc::new(app::build_services(&config).await?);
    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "atrium-api listening");
    axum::serve(listener, router).await?;

    Ok(())
}
