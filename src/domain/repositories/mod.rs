// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// - 缓存仓库（cache_repository）：键值缓存与哈希子接口，以及类型化的读写辅助
pub mod cache_repository;

pub use cache_repository::{Cache, CacheExt, CacheHashed, CacheHashedExt, MultiGet};
