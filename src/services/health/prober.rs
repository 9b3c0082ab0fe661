use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::HealthCheckConfig;
use crate::services::api::HealthCheckResponse;
use crate::services::registry::{HealthStatus, Instance, ListFilter, Registry};

/// 探测失败原因
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    #[error("Instance reported {status}")]
    Reported { status: HealthStatus },

    #[error("Instance reported failure without status")]
    Unsuccessful,
}

/// 主动健康探测器
///
/// 对每个实例发送 `GET http://{host}:{port}{path}`，期望得到 `HealthCheckResponse`。
/// 一次成功即上报 UP；连续失败达到阈值后才上报 DOWN。
/// 上报使用实例自己的令牌，健康状态仍然只经由认证过的 `update_health` 改变。
#[derive(Debug, Clone)]
pub struct HealthProber {
    registry: Registry,
    client: reqwest::Client,
    path: String,
    interval: Duration,
    failure_threshold: u32,
    failures: Arc<DashMap<String, u32>>,
}

impl HealthProber {
    pub fn new(registry: Registry, config: &HealthCheckConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            registry,
            client,
            path: config.path.clone(),
            interval: Duration::from_secs(config.interval_secs),
            failure_threshold: config.failure_threshold.max(1),
            failures: Arc::new(DashMap::new()),
        })
    }

    pub fn probe_url(&self, instance: &Instance) -> String {
        format!("http://{}:{}{}", instance.host, instance.port, self.path)
    }

    pub fn failure_count(&self, service_id: &str) -> u32 {
        self.failures
            .get(service_id)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    async fn probe(&self, instance: &Instance) -> Result<(), ProbeError> {
        let response = self.client.get(self.probe_url(instance)).send().await?;
        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }
        let check: HealthCheckResponse = response.json().await?;
        match check.data {
            Some(data) if check.success && data.status.is_up() => Ok(()),
            Some(data) => Err(ProbeError::Reported {
                status: data.status,
            }),
            None => Err(ProbeError::Unsuccessful),
        }
    }

    /// 根据探测结果更新失败计数，必要时上报健康状态，返回实际上报的状态
    pub fn record_outcome(
        &self,
        instance: &Instance,
        outcome: Result<(), ProbeError>,
    ) -> Option<HealthStatus> {
        let status = match outcome {
            Ok(()) => {
                self.failures.remove(&instance.id);
                HealthStatus::Up
            }
            Err(e) => {
                let failures = {
                    let mut entry = self.failures.entry(instance.id.clone()).or_insert(0);
                    *entry += 1;
                    *entry
                };
                tracing::debug!(
                    service_id = %instance.id,
                    failures,
                    threshold = self.failure_threshold,
                    error = %e,
                    "Health probe failed"
                );
                // 已经是不健康的实例不再刷新 lastUpdated，使其可以被清理
                if failures < self.failure_threshold || !instance.healthy {
                    return None;
                }
                HealthStatus::Down
            }
        };

        match self
            .registry
            .update_health(&instance.id, &instance.token, status)
        {
            Ok(()) => Some(status),
            Err(e) => {
                tracing::debug!(service_id = %instance.id, error = %e, "Failed to apply probe result");
                None
            }
        }
    }

    /// 探测所有实例一轮，返回探测数量
    pub async fn run_once(&self) -> usize {
        let instances = match self.registry.list(&ListFilter::default()) {
            Ok(list) => list.into_vec(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to list instances for health probe");
                return 0;
            }
        };

        let outcomes = futures::future::join_all(
            instances.iter().map(|instance| self.probe(instance)),
        )
        .await;
        for (instance, outcome) in instances.iter().zip(outcomes) {
            self.record_outcome(instance, outcome);
        }

        // 清理已经不存在的实例的计数
        let live: HashSet<&str> = instances.iter().map(|i| i.id.as_str()).collect();
        self.failures.retain(|id, _| live.contains(id.as_str()));

        tracing::debug!(probed = instances.len(), "Health probe round completed");
        instances.len()
    }

    pub fn spawn(self, tracker: &TaskTracker, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            path = %self.path,
            failure_threshold = self.failure_threshold,
            "Starting health prober"
        );
        tracker.spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Health prober stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        self.run_once().await;
                    }
                }
            }
        });
    }
}
