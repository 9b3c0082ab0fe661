use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 实例元数据，注册表不解析其内容
pub type InstanceMeta = Map<String, Value>;

// 已注册的服务实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub token: String,
    pub service_type: String,
    pub host: String,
    pub port: String,
    pub created: u64,
    pub last_updated: u64,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<InstanceMeta>,
}

// 注册请求：调用方只提供这些字段，其余由注册表生成
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRegisterRequest {
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<InstanceMeta>,
}

impl InstanceRegisterRequest {
    pub fn new(
        service_type: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        Self {
            service_type: service_type.into(),
            host: host.into(),
            port: port.into(),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: InstanceMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

// 注册成功的响应，令牌只在这里完整返回一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub service_id: String,
    pub token: String,
}

/// 健康上报状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

impl HealthStatus {
    pub fn is_up(self) -> bool {
        self == HealthStatus::Up
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "UP"),
            HealthStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// 列表过滤条件，各条件之间为“与”关系
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default)]
    pub healthy_only: bool,
}

impl ListFilter {
    pub fn service_type(service_type: impl Into<String>) -> Self {
        Self {
            service_type: Some(service_type.into()),
            healthy_only: false,
        }
    }

    pub fn healthy_only(mut self) -> Self {
        self.healthy_only = true;
        self
    }

    pub fn matches(&self, instance: &Instance) -> bool {
        if self.healthy_only && !instance.healthy {
            return false;
        }
        match &self.service_type {
            Some(service_type) => instance.service_type == *service_type,
            None => true,
        }
    }
}

// 注册表统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub by_service_type: BTreeMap<String, usize>,
}
