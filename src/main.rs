use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use lendgate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "lendgate::startup",
        "lendgate starting: RUST_LOG='{}', bind={}, unlock_default={}m, unlock_max={}m, events={}, bootstrap={}",
        rust_log,
        config.bind_addr(),
        config.unlock.default_minutes,
        config.unlock.max_minutes,
        config.events_enabled,
        config.bootstrap.as_ref().map(|b| b.email.as_str()).unwrap_or("<none>"),
    );

    lendgate::server::run(config).await
}
