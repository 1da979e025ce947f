// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据库模块
///
/// 基于 sea-orm 的关系数据库门面：连接池、会话、查询构建器与事务
pub mod connection;
pub mod orm;
pub mod query;
pub mod raw;
pub mod session;

pub use connection::{create_pool, SqlOptions};
pub use orm::{Orm, OrmTransaction};
pub use query::{Preload, Query};
pub use raw::RawQuery;
pub use session::{Session, SessionContext, SessionValues};
