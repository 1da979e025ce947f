// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;
use tracing::warn;

use crate::utils::errors::StoreError;

/// 未设置拨号超时时的默认值
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// 未设置读写超时时的默认值
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(3);

/// 缓存连接配置
///
/// `addresses` 只有一个地址时使用单节点模式，多于一个时使用集群模式。
/// 零值的时长表示使用默认值（`max_conn_age` 为零表示不轮换连接）。
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    pub addresses: Vec<String>,
    /// 已废弃，请使用 `addresses`
    pub address: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 数据库编号，仅单节点模式可用
    pub db: i64,
    pub pool_size: u32,
    pub min_idle_conns: u32,
    pub dial_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_conn_age: Duration,
}

/// 部署模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentMode {
    Standalone(String),
    Cluster(Vec<String>),
}

impl DeploymentMode {
    pub fn is_cluster(&self) -> bool {
        matches!(self, DeploymentMode::Cluster(_))
    }
}

impl CacheOptions {
    /// 根据地址配置确定部署模式，不进行任何网络操作
    pub fn deployment_mode(&self) -> Result<DeploymentMode, StoreError> {
        if let Some(legacy) = self.address.as_deref().filter(|a| !a.is_empty()) {
            if self.addresses.is_empty() {
                warn!(
                    address = legacy,
                    "cache option `address` is deprecated, use `addresses` instead"
                );
                return Ok(DeploymentMode::Standalone(legacy.to_string()));
            }

            if !self.addresses.iter().any(|a| a == legacy) {
                warn!(
                    address = legacy,
                    addresses = ?self.addresses,
                    "deprecated `address` differs from `addresses` and is ignored"
                );
            }
        }

        match self.addresses.as_slice() {
            [] => Err(StoreError::InvalidConfiguration(
                "at least one cache address is required".to_string(),
            )),
            [single] => Ok(DeploymentMode::Standalone(single.clone())),
            many => Ok(DeploymentMode::Cluster(many.to_vec())),
        }
    }

    /// 校验配置并返回部署模式
    pub fn validate(&self) -> Result<DeploymentMode, StoreError> {
        let mode = self.deployment_mode()?;

        if mode.is_cluster() && self.db != 0 {
            return Err(StoreError::UnsupportedOption {
                option: "db",
                reason: "database selection is not available on a redis cluster".to_string(),
            });
        }

        if self.db < 0 {
            return Err(StoreError::InvalidConfiguration(format!(
                "database index must not be negative, got {}",
                self.db
            )));
        }

        Ok(mode)
    }

    /// 拨号超时
    pub fn effective_dial_timeout(&self) -> Duration {
        if self.dial_timeout.is_zero() {
            DEFAULT_DIAL_TIMEOUT
        } else {
            self.dial_timeout
        }
    }

    /// 单条命令的往返截止时间（写入 + 读取）
    pub fn response_timeout(&self) -> Duration {
        let read = if self.read_timeout.is_zero() {
            DEFAULT_IO_TIMEOUT
        } else {
            self.read_timeout
        };
        let write = if self.write_timeout.is_zero() {
            read
        } else {
            self.write_timeout
        };
        read + write
    }

    /// 构造节点连接 URL
    ///
    /// 已带 `redis://` 或 `rediss://` 前缀的地址原样使用，
    /// 否则按 `host:port` 拼接凭据与数据库编号。
    pub(crate) fn node_url(&self, address: &str, with_db: bool) -> String {
        if address.starts_with("redis://") || address.starts_with("rediss://") {
            return address.to_string();
        }

        let credentials = match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => format!(
                "{}:{}@",
                urlencoding::encode(user),
                urlencoding::encode(pass)
            ),
            (None, Some(pass)) => format!(":{}@", urlencoding::encode(pass)),
            (Some(user), None) => format!("{}@", urlencoding::encode(user)),
            (None, None) => String::new(),
        };

        if with_db && self.db > 0 {
            format!("redis://{}{}/{}", credentials, address, self.db)
        } else {
            format!("redis://{}{}", credentials, address)
        }
    }
}
