// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 定义存储门面的抽象接口，具体实现由基础设施层提供。
pub mod repositories;
