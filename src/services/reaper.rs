use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::RegistryConfig;
use crate::services::registry::Registry;

/// 定期调用 `Registry::reap` 的外部调度器
#[derive(Debug, Clone)]
pub struct Reaper {
    registry: Registry,
    interval: Duration,
    max_age_ms: u64,
}

impl Reaper {
    pub fn new(registry: Registry, interval: Duration, max_age_ms: u64) -> Self {
        Self {
            registry,
            interval,
            max_age_ms,
        }
    }

    pub fn from_config(registry: Registry, config: &RegistryConfig) -> Self {
        Self::new(
            registry,
            Duration::from_secs(config.reap_interval_secs),
            config.max_age_ms,
        )
    }

    // 执行一次清理，返回删除数量
    pub fn run_once(&self) -> usize {
        match self.registry.reap(self.max_age_ms) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(error = %e, "Reap check failed");
                0
            }
        }
    }

    // 启动定期清理任务，直到 shutdown 被取消
    pub fn spawn(self, tracker: &TaskTracker, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_age_ms = self.max_age_ms,
            "Starting registry reaper"
        );
        tracker.spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Registry reaper stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        tracing::debug!("Executing registry reap check...");
                        self.run_once();
                    }
                }
            }
        });
    }
}
