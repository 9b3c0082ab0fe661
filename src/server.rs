use std::future::Future;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tonic::transport::Server;

use crate::config::Config;
use crate::services::api::RegistryApi;
use crate::services::health::HealthProber;
use crate::services::reaper::Reaper;
use crate::services::registry::Registry;
use crate::services::router::{EnvelopeFallbackLayer, RegistryRouter};

pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr).await?;

    // 初始化服务注册表
    let registry = Registry::new();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    serve(listener, registry, &config, shutdown).await
}

/// 在给定监听器上运行网关，直到 `shutdown` 完成
pub async fn serve<F>(
    listener: TcpListener,
    registry: Registry,
    config: &Config,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send,
{
    let local_addr = listener.local_addr()?;
    let prober = if config.health_check.enabled {
        Some(HealthProber::new(registry.clone(), &config.health_check)?)
    } else {
        None
    };

    let tracker = TaskTracker::new();
    let cancel = CancellationToken::new();

    // 启动定期清理任务
    Reaper::from_config(registry.clone(), &config.registry).spawn(&tracker, cancel.clone());
    if let Some(prober) = prober {
        prober.spawn(&tracker, cancel.clone());
    }

    let fallback = EnvelopeFallbackLayer::new(registry.clone());
    let router = RegistryRouter::new(RegistryApi::new(registry));

    tracing::info!(addr = %local_addr, "Registry gateway listening");

    let result = Server::builder()
        .accept_http1(config.server.accept_http1)
        .layer(fallback)
        .add_service(router)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await;

    cancel.cancel();
    tracker.close();
    tracker.wait().await;
    tracing::info!("Registry gateway stopped");

    result?;
    Ok(())
}
