// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 包含的子模块：
/// - 缓存（cache）：基于Redis的键值门面，支持单节点与集群
/// - 数据库（database）：基于sea-orm的关系数据库门面
/// - 可观测性（observability）：钩子、查询日志、追踪与指标
///
/// 两个门面互不依赖。
pub mod cache;
pub mod database;
pub mod observability;
