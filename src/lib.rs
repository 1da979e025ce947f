// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 存储访问层
//!
//! 键值缓存门面（Redis 单节点或集群）与关系数据库门面（sea-orm），
//! 以及可选挂载的追踪与指标钩子。

/// 配置模块
///
/// 处理配置文件和环境变量
pub mod config;

/// 领域模块
///
/// 存储门面的抽象接口
pub mod domain;

/// 基础设施模块
///
/// 缓存、数据库与可观测性的具体实现
pub mod infrastructure;

/// 工具模块
///
/// 错误类型与日志初始化
pub mod utils;

pub use domain::repositories::{Cache, CacheExt, CacheHashed, CacheHashedExt, MultiGet};
pub use infrastructure::cache::{CacheOptions, DeploymentMode, RedisCache};
pub use infrastructure::database::{
    Orm, OrmTransaction, Preload, Query, RawQuery, Session, SessionValues, SqlOptions,
};
pub use infrastructure::observability::{
    use_cache_telemetry, use_orm_telemetry, CommandEvent, CommandHook, Instrumentable,
    QueryEvent, QueryHook, QueryLogger, TelemetryOptions, TracingHook,
};
pub use utils::errors::{KeyFailure, StoreError};
