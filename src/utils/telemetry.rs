// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 安装全局日志订阅器
///
/// 使用 `RUST_LOG` 过滤，未设置时默认 `info,storelayer=debug`。
/// 重复调用时保留已安装的订阅器。
pub fn init_telemetry() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storelayer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// 安装输出 JSON 行的全局日志订阅器
pub fn init_json_telemetry() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storelayer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .try_init();
}
