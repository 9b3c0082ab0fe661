use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::error::RegistryError;
use super::token::{constant_time_eq, generate_token};
use super::types::{
    HealthStatus, Instance, InstanceRegisterRequest, ListFilter, RegistrationResponse,
    RegistryStats,
};

// 实例记录，seq 用于同一毫秒内注册时的稳定排序
#[derive(Debug, Clone)]
struct Record {
    seq: u64,
    instance: Instance,
}

// 主表与令牌反向索引必须在同一把锁内同步修改
#[derive(Debug, Default)]
struct RegistryState {
    instances: HashMap<String, Record>,
    tokens: HashMap<String, String>,
    next_seq: u64,
}

/// 服务注册表
///
/// 克隆得到的是同一份状态的句柄。所有修改操作持有写锁，
/// 读操作持有读锁并返回副本，因此读者不会看到半完成的修改。
/// 临界区内没有任何 I/O。
#[derive(Debug, Clone)]
pub struct Registry {
    state: Arc<RwLock<RegistryState>>,
    clock: Arc<dyn Clock>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// `list` 的结果：按注册顺序排列的快照，可以反复迭代
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceList {
    instances: Vec<Instance>,
}

impl InstanceList {
    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn into_vec(self) -> Vec<Instance> {
        self.instances
    }
}

impl IntoIterator for InstanceList {
    type Item = Instance;
    type IntoIter = std::vec::IntoIter<Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.into_iter()
    }
}

impl<'a> IntoIterator for &'a InstanceList {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            clock,
        }
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>, RegistryError> {
        self.state
            .read()
            .map_err(|e| RegistryError::Internal(format!("registry lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>, RegistryError> {
        self.state
            .write()
            .map_err(|e| RegistryError::Internal(format!("registry lock poisoned: {e}")))
    }

    fn validate(req: &InstanceRegisterRequest) -> Result<(), RegistryError> {
        if req.service_type.trim().is_empty() {
            return Err(RegistryError::Validation(
                "serviceType must not be empty".to_string(),
            ));
        }
        if req.host.trim().is_empty() {
            return Err(RegistryError::Validation("host is required".to_string()));
        }
        if req.port.trim().is_empty() {
            return Err(RegistryError::Validation("port is required".to_string()));
        }
        Ok(())
    }

    /// 注册新实例，返回 id 与令牌
    pub fn register(
        &self,
        req: InstanceRegisterRequest,
    ) -> Result<RegistrationResponse, RegistryError> {
        Self::validate(&req)?;

        let mut state = self.write()?;

        let mut id = Uuid::new_v4().to_string();
        while state.instances.contains_key(&id) {
            tracing::warn!(service_id = %id, "Generated service id collided, regenerating");
            id = Uuid::new_v4().to_string();
        }

        let mut token = generate_token();
        while state.tokens.contains_key(&token) {
            tracing::warn!("Generated token collided, regenerating");
            token = generate_token();
        }

        let now = self.clock.now_millis();
        let instance = Instance {
            id: id.clone(),
            token: token.clone(),
            service_type: req.service_type,
            host: req.host,
            port: req.port,
            created: now,
            last_updated: now,
            healthy: false,
            meta: req.meta,
        };

        tracing::info!(
            service_id = %id,
            service_type = %instance.service_type,
            host = %instance.host,
            port = %instance.port,
            "Registering service instance"
        );

        let seq = state.next_seq;
        state.next_seq += 1;
        state.tokens.insert(token.clone(), id.clone());
        state.instances.insert(id.clone(), Record { seq, instance });

        Ok(RegistrationResponse {
            service_id: id,
            token,
        })
    }

    /// 校验 id 与令牌是否匹配
    pub fn authenticate(&self, id: &str, token: &str) -> bool {
        match self.read() {
            Ok(state) => state
                .instances
                .get(id)
                .is_some_and(|record| constant_time_eq(&record.instance.token, token)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to authenticate");
                false
            }
        }
    }

    /// 通过令牌反查实例 id
    pub fn lookup_token(&self, token: &str) -> Option<String> {
        self.read().ok()?.tokens.get(token).cloned()
    }

    // 在写锁内取得已认证的可变记录
    fn authorized<'a>(
        state: &'a mut RegistryState,
        id: &str,
        token: &str,
    ) -> Result<&'a mut Record, RegistryError> {
        let record = state
            .instances
            .get_mut(id)
            .ok_or_else(|| RegistryError::ServiceNotExist {
                service_id: id.to_string(),
            })?;
        if !constant_time_eq(&record.instance.token, token) {
            tracing::warn!(service_id = %id, "Rejected request with invalid token");
            return Err(RegistryError::Auth {
                service_id: id.to_string(),
            });
        }
        Ok(record)
    }

    fn next_timestamp(&self, previous: u64) -> u64 {
        self.clock.now_millis().max(previous.saturating_add(1))
    }

    /// 应用一次健康上报
    pub fn update_health(
        &self,
        id: &str,
        token: &str,
        status: HealthStatus,
    ) -> Result<(), RegistryError> {
        let mut state = self.write()?;
        let record = Self::authorized(&mut state, id, token)?;

        let was_healthy = record.instance.healthy;
        record.instance.healthy = status.is_up();
        record.instance.last_updated = self.next_timestamp(record.instance.last_updated);

        if was_healthy != record.instance.healthy {
            tracing::info!(
                service_id = %id,
                service_type = %record.instance.service_type,
                status = %status,
                "Service health changed"
            );
        } else {
            tracing::debug!(service_id = %id, status = %status, "Health report accepted");
        }
        Ok(())
    }

    /// 心跳：只刷新 lastUpdated，不改变健康状态
    pub fn touch(&self, id: &str, token: &str) -> Result<(), RegistryError> {
        let mut state = self.write()?;
        let record = Self::authorized(&mut state, id, token)?;
        record.instance.last_updated = self.next_timestamp(record.instance.last_updated);
        tracing::debug!(service_id = %id, "Heartbeat accepted");
        Ok(())
    }

    /// 获取实例副本
    pub fn get(&self, id: &str) -> Result<Instance, RegistryError> {
        self.read()?
            .instances
            .get(id)
            .map(|record| record.instance.clone())
            .ok_or_else(|| RegistryError::ServiceNotExist {
                service_id: id.to_string(),
            })
    }

    /// 按过滤条件列出实例，按注册先后排序
    pub fn list(&self, filter: &ListFilter) -> Result<InstanceList, RegistryError> {
        let state = self.read()?;
        let mut records: Vec<&Record> = state
            .instances
            .values()
            .filter(|record| filter.matches(&record.instance))
            .collect();
        records.sort_by_key(|record| (record.instance.created, record.seq));
        let instances = records
            .into_iter()
            .map(|record| record.instance.clone())
            .collect();
        Ok(InstanceList { instances })
    }

    /// 注销实例。实例不存在时返回 false，令牌错误时返回错误
    pub fn deregister(&self, id: &str, token: &str) -> Result<bool, RegistryError> {
        let mut state = self.write()?;
        if !state.instances.contains_key(id) {
            tracing::debug!(service_id = %id, "Deregister for unknown service ignored");
            return Ok(false);
        }
        let token = Self::authorized(&mut state, id, token)?.instance.token.clone();

        state.tokens.remove(&token);
        if let Some(record) = state.instances.remove(id) {
            tracing::info!(
                service_id = %id,
                service_type = %record.instance.service_type,
                "Deregistered service instance"
            );
        }
        Ok(true)
    }

    fn is_stale(instance: &Instance, now: u64, max_age_ms: u64) -> bool {
        !instance.healthy && now.saturating_sub(instance.last_updated) > max_age_ms
    }

    /// 清理超过 max_age_ms 未更新且不健康的实例
    pub fn reap(&self, max_age_ms: u64) -> Result<usize, RegistryError> {
        let now = self.clock.now_millis();
        let victims = self.reap_candidates(now, max_age_ms)?;
        if victims.is_empty() {
            tracing::debug!("Reap check completed, nothing to remove");
            return Ok(0);
        }
        let removed = self.remove_stale(victims, now, max_age_ms)?;
        tracing::debug!(removed, "Reap check completed");
        Ok(removed)
    }

    // 在读锁下收集候选，避免长时间持有写锁
    fn reap_candidates(&self, now: u64, max_age_ms: u64) -> Result<Vec<String>, RegistryError> {
        let state = self.read()?;
        Ok(state
            .instances
            .values()
            .filter(|record| Self::is_stale(&record.instance, now, max_age_ms))
            .map(|record| record.instance.id.clone())
            .collect())
    }

    fn remove_stale(
        &self,
        victims: Vec<String>,
        now: u64,
        max_age_ms: u64,
    ) -> Result<usize, RegistryError> {
        let mut state = self.write()?;
        let mut removed = 0;
        for id in victims {
            // 收集之后可能又收到了上报，删除前重新判断
            let still_stale = state
                .instances
                .get(&id)
                .is_some_and(|record| Self::is_stale(&record.instance, now, max_age_ms));
            if !still_stale {
                continue;
            }
            if let Some(record) = state.instances.remove(&id) {
                state.tokens.remove(&record.instance.token);
                tracing::warn!(
                    service_id = %id,
                    service_type = %record.instance.service_type,
                    age_ms = now.saturating_sub(record.instance.last_updated),
                    max_age_ms,
                    "Reaped stale unhealthy service instance"
                );
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize, RegistryError> {
        Ok(self.read()?.instances.len())
    }

    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<RegistryStats, RegistryError> {
        let state = self.read()?;
        let mut by_service_type = BTreeMap::new();
        let mut healthy = 0;
        for record in state.instances.values() {
            if record.instance.healthy {
                healthy += 1;
            }
            *by_service_type
                .entry(record.instance.service_type.clone())
                .or_insert(0) += 1;
        }
        let total = state.instances.len();
        Ok(RegistryStats {
            total,
            healthy,
            unhealthy: total - healthy,
            by_service_type,
        })
    }
}
