// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 缓存模块
///
/// 提供基于Redis的键值缓存门面，支持单节点与集群部署
pub mod options;
pub mod redis_client;

pub use options::{CacheOptions, DeploymentMode};
pub use redis_client::RedisCache;
