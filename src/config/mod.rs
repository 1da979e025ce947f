// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 从配置文件与环境变量加载缓存和数据库配置
pub mod settings;

pub use settings::{CacheSettings, DatabaseSettings, Settings};
