use foodcart_hex::application::Services;
use foodcart_hex::config::Config;
use foodcart_hex::inbound::http::{HttpServer, HttpServerConfig};
use foodcart_hex::outbound::YandexGeocoder;
use foodcart_repo::{build_repo, Repo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for YANDEX_API_KEY / DATABASE_URL / SERVER_PORT when present.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
        .init();

    let config = Config::from_env()?;
    let repo: Repo = build_repo(config.database_url.as_deref(), config.cache_policy).await?;
    let geocoder = YandexGeocoder::new(&config.geocoder)?;
    tracing::info!(
        geocoder = %config.geocoder.base_url,
        ttl = ?config.cache_policy.ttl,
        max_entries = ?config.cache_policy.max_entries,
        "geocoding configured"
    );
    let services = Services::new(repo, geocoder);

    let server_cfg = HttpServerConfig {
        port: config.server_port.clone(),
    };

    let http = HttpServer::new(services, server_cfg).await?;
    http.run().await
}
