// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::infrastructure::observability::hooks::{CommandHook, Instrumentable};
use crate::utils::errors::StoreError;

/// 键值缓存接口
///
/// 屏蔽后端是单节点还是集群。所有方法都是异步的，
/// 丢弃返回的 future 即取消正在进行的往返。
#[async_trait]
pub trait Cache: Send + Sync {
    /// 无过期时间写入
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// 写入并设置过期时间，`ttl` 为零表示不过期
    async fn set_exp(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;

    /// 仅在键不存在时写入，返回是否写入
    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, StoreError>;

    /// 批量写入
    ///
    /// 所有写入都会发出后才检查结果；任一键失败时返回
    /// [`StoreError::AggregateWrite`]，其中列出每个失败的键。
    async fn set_exp_pipe(
        &self,
        values: HashMap<String, Vec<u8>>,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// 读取原始字节，键不存在时返回 [`StoreError::NotFound`]
    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// 批量读取原始字节，结果与 `keys` 一一对应
    async fn mget_bytes(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError>;

    /// 删除键，返回实际删除的数量
    async fn del(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// 自增并返回新值
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// 自减并返回新值
    async fn decr(&self, key: &str) -> Result<i64, StoreError>;

    /// 返回匹配 glob 模式的所有键
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// 释放底层连接，之后的调用返回 [`StoreError::Closed`]
    async fn close(&self) -> Result<(), StoreError>;

    /// 哈希子接口
    fn hashed(&self) -> Result<&dyn CacheHashed, StoreError>;

    /// 钩子挂载能力，默认不支持
    fn as_instrumentable(&self) -> Option<&dyn Instrumentable<dyn CommandHook>> {
        None
    }
}

/// 哈希字段操作
#[async_trait]
pub trait CacheHashed: Send + Sync {
    /// 写入字段，返回字段是否为新建
    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<bool, StoreError>;

    async fn hexists(&self, key: &str, field: &str) -> Result<bool, StoreError>;

    /// 读取字段，不存在时返回 [`StoreError::NotFound`]
    async fn hget_bytes(&self, key: &str, field: &str) -> Result<Vec<u8>, StoreError>;
}

/// 批量读取结果
#[derive(Debug, Clone, PartialEq)]
pub struct MultiGet<T> {
    /// 命中的值，按请求顺序排列
    pub values: Vec<T>,
    /// 未命中的键，按请求顺序排列
    pub missing: Vec<String>,
}

impl<T> Default for MultiGet<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            missing: Vec::new(),
        }
    }
}

fn encode<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(StoreError::Encode)
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Decode {
        key: key.to_string(),
        source,
    })
}

/// 类型化读写，值以 JSON 编码
#[async_trait]
pub trait CacheExt: Cache {
    /// 读取并解码
    async fn get<T>(&self, key: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let bytes = self.get_bytes(key).await?;
        decode(key, &bytes)
    }

    /// 编码任意值后写入并设置过期时间
    async fn set_any_exp<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<(), StoreError>
    where
        V: Serialize + Sync + ?Sized,
    {
        let bytes = encode(value)?;
        self.set_exp(key, &bytes, ttl).await
    }

    /// 编码任意值后仅在键不存在时写入
    async fn set_nx_any<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<bool, StoreError>
    where
        V: Serialize + Sync + ?Sized,
    {
        let bytes = encode(value)?;
        self.set_nx(key, &bytes, ttl).await
    }

    /// 批量读取并解码，未命中的键作为数据返回而不是错误
    async fn mget<T>(&self, keys: &[String]) -> Result<MultiGet<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.mget_bytes(keys).await?;
        let mut result = MultiGet::default();

        for (key, value) in keys.iter().zip(raw) {
            match value {
                Some(bytes) => result.values.push(decode(key, &bytes)?),
                None => result.missing.push(key.clone()),
            }
        }

        Ok(result)
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// 类型化哈希字段读写
#[async_trait]
pub trait CacheHashedExt: CacheHashed {
    async fn hset_any<V>(&self, key: &str, field: &str, value: &V) -> Result<bool, StoreError>
    where
        V: Serialize + Sync + ?Sized,
    {
        let bytes = encode(value)?;
        self.hset(key, field, &bytes).await
    }

    async fn hget<T>(&self, key: &str, field: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let bytes = self.hget_bytes(key, field).await?;
        decode(&format!("{}.{}", key, field), &bytes)
    }
}

impl<H: CacheHashed + ?Sized> CacheHashedExt for H {}
