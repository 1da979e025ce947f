// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fmt;
use std::time::Duration;

use sea_orm::DbErr;
use thiserror::Error;

/// 批量写入中单个键的失败信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFailure {
    /// 写入失败的键
    pub key: String,
    /// 失败原因
    pub cause: String,
}

impl fmt::Display for KeyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.cause)
    }
}

/// 存储层错误类型
///
/// 驱动返回的错误（`Redis`、`Database`）原样透传，
/// 其余变体只覆盖门面自身能判断的情况。
#[derive(Error, Debug)]
pub enum StoreError {
    /// 键或哈希字段不存在
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// 存储的字节无法解码为请求的类型
    #[error("failed to decode value of {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// 值无法编码
    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    /// 建立连接失败
    #[error("connection error: {0}")]
    Connection(String),

    /// 配置无效
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// 当前部署模式不支持的配置项
    #[error("unsupported option {option}: {reason}")]
    UnsupportedOption { option: &'static str, reason: String },

    /// 批量写入中有一个或多个键失败
    #[error("{} of the batched writes failed: {}", .failures.len(), join_failures(.failures))]
    AggregateWrite { failures: Vec<KeyFailure> },

    /// 查询构建过程中记录的错误
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// 操作超过截止时间
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// 句柄已关闭
    #[error("client is closed")]
    Closed,

    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    Database(#[from] DbErr),
}

fn join_failures(failures: &[KeyFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl StoreError {
    /// 是否为“未找到”类错误（缓存键缺失或查询无结果）
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::Database(DbErr::RecordNotFound(_))
        )
    }

    /// 是否为配置错误
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidConfiguration(_) | StoreError::UnsupportedOption { .. }
        )
    }

    /// 是否为网络或连接池错误
    pub fn is_connection(&self) -> bool {
        match self {
            StoreError::Connection(_) => true,
            StoreError::Redis(err) => {
                err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal()
            }
            StoreError::Database(DbErr::Conn(_)) | StoreError::Database(DbErr::ConnectionAcquire(_)) => {
                true
            }
            _ => false,
        }
    }

    /// 批量写入失败的键列表
    pub fn failed_keys(&self) -> Vec<&str> {
        match self {
            StoreError::AggregateWrite { failures } => {
                failures.iter().map(|f| f.key.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}
