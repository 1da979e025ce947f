// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::debug;

use crate::utils::errors::StoreError;

/// 关系数据库连接配置
///
/// 零值的时长与连接数表示使用驱动默认值。
#[derive(Debug, Clone)]
pub struct SqlOptions {
    pub connection_string: String,
    pub max_lifetime: Duration,
    pub max_idle_conns: u32,
    pub max_open_conns: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// 安装查询日志钩子
    pub log_queries: bool,
    pub use_prepared_stmt: bool,
    /// 为 `false` 时，事务外的单条写操作各自包裹在事务中
    pub skip_default_transaction: bool,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            max_lifetime: Duration::ZERO,
            max_idle_conns: 0,
            max_open_conns: 0,
            connect_timeout: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            log_queries: false,
            use_prepared_stmt: true,
            skip_default_transaction: false,
        }
    }
}

impl SqlOptions {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// 转换为 sea-orm 连接参数
    pub fn connect_options(&self) -> Result<ConnectOptions, StoreError> {
        if self.connection_string.trim().is_empty() {
            return Err(StoreError::InvalidConfiguration(
                "database connection string is required".to_string(),
            ));
        }

        let mut opt = ConnectOptions::new(self.connection_string.to_owned());

        if self.max_open_conns > 0 {
            opt.max_connections(self.max_open_conns);
        }

        if self.max_idle_conns > 0 {
            let min = if self.max_open_conns > 0 {
                self.max_idle_conns.min(self.max_open_conns)
            } else {
                self.max_idle_conns
            };
            opt.min_connections(min);
        }

        if !self.connect_timeout.is_zero() {
            opt.connect_timeout(self.connect_timeout);
            opt.acquire_timeout(self.connect_timeout);
        }

        if !self.idle_timeout.is_zero() {
            opt.idle_timeout(self.idle_timeout);
        }

        if !self.max_lifetime.is_zero() {
            opt.max_lifetime(self.max_lifetime);
        }

        opt.sqlx_logging(false);

        Ok(opt)
    }
}

/// 创建数据库连接池
///
/// # 参数
///
/// * `options` - 数据库配置
///
/// # 返回值
///
/// * `Ok(DatabaseConnection)` - 数据库连接
/// * `Err(StoreError)` - 配置无效或连接失败
pub async fn create_pool(options: &SqlOptions) -> Result<DatabaseConnection, StoreError> {
    let opt = options.connect_options()?;
    debug!(
        max_open_conns = options.max_open_conns,
        max_idle_conns = options.max_idle_conns,
        "opening database pool"
    );

    Ok(Database::connect(opt).await?)
}
