use registry_gateway::config::Config;
use registry_gateway::{logging, server};

#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    logging::init(&config.logging);

    tracing::info!(
        listen_addr = %config.server.listen_addr,
        health_check = config.health_check.enabled,
        "Starting registry gateway..."
    );
    server::start(config).await
}
