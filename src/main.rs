use chathub::config::HubConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("chathub: line-oriented chat hub");

    // Bind address and advertised IP: CHATHUB_BIND / CHATHUB_SERVER_IP.
    let config = HubConfig::from_env();

    chathub::hub::server::run(&config).await
}
