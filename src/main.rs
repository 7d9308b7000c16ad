use std::net::SocketAddr;

use conduit::{serve, Config};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conduit=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("invalid configuration: {error:#}");
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], 3001));
    tracing::info!(%addr, "server started");
    if let Err(error) = serve(config, addr).await {
        tracing::error!("server error: {error:#}");
    }
}
