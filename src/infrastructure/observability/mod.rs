// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 可观测性模块
///
/// 提供钩子接口、查询日志、追踪与指标的挂载
pub mod hooks;
pub mod logger;
pub mod metrics;
pub mod telemetry;

pub use hooks::{CommandEvent, CommandHook, Instrumentable, QueryEvent, QueryHook};
pub use logger::QueryLogger;
pub use telemetry::{use_cache_telemetry, use_orm_telemetry, TelemetryOptions, TracingHook};
