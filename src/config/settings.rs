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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::infrastructure::cache::CacheOptions;
use crate::infrastructure::database::SqlOptions;

/// 存储层配置
///
/// 包含缓存与关系数据库两部分
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 缓存配置
    pub cache: CacheSettings,
    /// 数据库配置
    pub database: DatabaseSettings,
}

/// 缓存配置设置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// 节点地址，一个为单节点，多个为集群
    pub addresses: Vec<String>,
    /// 已废弃的单地址配置
    pub address: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
    pub pool_size: u32,
    pub min_idle_conns: u32,
    /// 拨号超时（毫秒）
    pub dial_timeout_ms: u64,
    /// 读超时（毫秒）
    pub read_timeout_ms: u64,
    /// 写超时（毫秒）
    pub write_timeout_ms: u64,
    /// 连接最大存活时间（秒）
    pub max_conn_age_secs: u64,
}

const DEFAULT_CACHE_ADDRESS: &str = "127.0.0.1:6379";

impl CacheSettings {
    /// 未配置任何地址时回落到本地单节点
    ///
    /// 放在反序列化之后处理，否则 `addresses` 的默认值会遮住旧的 `address`。
    fn with_default_address(mut self) -> Self {
        let has_legacy = self
            .address
            .as_deref()
            .is_some_and(|address| !address.is_empty());
        if self.addresses.is_empty() && !has_legacy {
            self.addresses = vec![DEFAULT_CACHE_ADDRESS.to_string()];
        }
        self
    }

    pub fn to_options(&self) -> CacheOptions {
        CacheOptions {
            addresses: self.addresses.clone(),
            address: self.address.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            db: self.db,
            pool_size: self.pool_size,
            min_idle_conns: self.min_idle_conns,
            dial_timeout: Duration::from_millis(self.dial_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            max_conn_age: Duration::from_secs(self.max_conn_age_secs),
        }
    }
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_open_conns: u32,
    /// 保持的空闲连接数
    pub max_idle_conns: u32,
    /// 连接超时时间（秒）
    pub connect_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大存活时间（秒）
    pub max_lifetime_secs: u64,
    pub log_queries: bool,
    pub use_prepared_stmt: bool,
    pub skip_default_transaction: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_open_conns: 0,
            max_idle_conns: 0,
            connect_timeout_secs: 0,
            idle_timeout_secs: 0,
            max_lifetime_secs: 0,
            log_queries: false,
            use_prepared_stmt: true,
            skip_default_transaction: false,
        }
    }
}

impl DatabaseSettings {
    pub fn to_options(&self) -> SqlOptions {
        SqlOptions {
            connection_string: self.url.clone(),
            max_lifetime: Duration::from_secs(self.max_lifetime_secs),
            max_idle_conns: self.max_idle_conns,
            max_open_conns: self.max_open_conns,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            log_queries: self.log_queries,
            use_prepared_stmt: self.use_prepared_stmt,
            skip_default_transaction: self.skip_default_transaction,
        }
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    builder
        // Default cache settings
        .set_default("cache.dial_timeout_ms", 5000)?
        .set_default("cache.read_timeout_ms", 3000)?
        .set_default("cache.write_timeout_ms", 3000)?
        // Default DB pool settings
        .set_default("database.url", "sqlite::memory:")?
        .set_default("database.max_open_conns", 100)?
        .set_default("database.max_idle_conns", 10)?
        .set_default("database.connect_timeout_secs", 10)?
        .set_default("database.idle_timeout_secs", 300)?
        .set_default("database.max_lifetime_secs", 3600)
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、`config/default`、`config/{APP_ENVIRONMENT}`
    /// 以及 `STORELAYER__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = with_defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("STORELAYER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cache.addresses")
                    .try_parsing(true),
            );

        Self::load(builder)
    }

    /// 只从指定文件加载（叠加默认值）
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder =
            with_defaults(Config::builder())?.add_source(File::from(path.as_ref()).required(true));

        Self::load(builder)
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let mut settings: Self = builder.build()?.try_deserialize()?;
        settings.cache = settings.cache.with_default_address();
        Ok(settings)
    }
}
