use anyhow::Context;

use groupcart_observability::LogConfig;
use groupcart_relay::config::RelayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = LogConfig::from_env().context("invalid log configuration")?;
    groupcart_observability::init(&log_config);

    let config = RelayConfig::from_env().context("invalid relay configuration")?;
    let app = groupcart_relay::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
