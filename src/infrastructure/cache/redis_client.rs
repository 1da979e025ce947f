// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use futures::future::join_all;
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{Cmd, FromRedisValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::repositories::cache_repository::{Cache, CacheHashed};
use crate::infrastructure::cache::options::{CacheOptions, DeploymentMode};
use crate::infrastructure::observability::hooks::{
    CommandEvent, CommandHook, HookList, Instrumentable,
};
use crate::utils::errors::{KeyFailure, StoreError};

enum Client {
    Standalone(redis::Client),
    Cluster(ClusterClient),
}

#[derive(Clone)]
enum Connection {
    Standalone(MultiplexedConnection),
    Cluster(ClusterConnection),
}

struct Dialed {
    connection: Connection,
    dialed_at: Instant,
}

/// Redis缓存客户端
///
/// 单节点与集群共用同一套接口。构造时不访问网络，
/// 首条命令时建立多路复用连接并供所有调用方共享。
pub struct RedisCache {
    client: Client,
    mode: DeploymentMode,
    options: CacheOptions,
    slot: Mutex<Option<Dialed>>,
    closed: AtomicBool,
    hooks: HookList<dyn CommandHook>,
}

impl RedisCache {
    /// 根据配置创建客户端
    ///
    /// # 参数
    ///
    /// * `options` - 缓存连接配置
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisCache)` - 客户端实例
    /// * `Err(StoreError)` - 配置无效，例如集群模式下指定了数据库编号
    pub fn new(options: CacheOptions) -> Result<Self, StoreError> {
        let mode = options.validate()?;

        if options.pool_size > 0 || options.min_idle_conns > 0 {
            debug!(
                pool_size = options.pool_size,
                min_idle_conns = options.min_idle_conns,
                "redis connections are multiplexed, pool sizing is not applied"
            );
        }

        let client = match &mode {
            DeploymentMode::Standalone(address) => {
                Client::Standalone(redis::Client::open(options.node_url(address, true))?)
            }
            DeploymentMode::Cluster(addresses) => {
                let nodes: Vec<String> = addresses
                    .iter()
                    .map(|address| options.node_url(address, false))
                    .collect();
                Client::Cluster(ClusterClient::new(nodes)?)
            }
        };

        info!(mode = ?mode, "redis cache client created");

        Ok(Self {
            client,
            mode,
            options,
            slot: Mutex::new(None),
            closed: AtomicBool::new(false),
            hooks: HookList::new(),
        })
    }

    /// 当前部署模式
    pub fn mode(&self) -> &DeploymentMode {
        &self.mode
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    async fn connection(&self) -> Result<Connection, StoreError> {
        let mut slot = self.slot.lock().await;

        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        if let Some(dialed) = slot.as_ref() {
            let max_age = self.options.max_conn_age;
            if max_age.is_zero() || dialed.dialed_at.elapsed() < max_age {
                return Ok(dialed.connection.clone());
            }
            debug!(?max_age, "redis connection reached max age, redialing");
        }

        let connection = self.dial().await?;
        *slot = Some(Dialed {
            connection: connection.clone(),
            dialed_at: Instant::now(),
        });
        Ok(connection)
    }

    async fn dial(&self) -> Result<Connection, StoreError> {
        let timeout = self.options.effective_dial_timeout();
        let dial = async {
            match &self.client {
                Client::Standalone(client) => client
                    .get_multiplexed_async_connection()
                    .await
                    .map(Connection::Standalone),
                Client::Cluster(client) => {
                    client.get_async_connection().await.map(Connection::Cluster)
                }
            }
        };

        match tokio::time::timeout(timeout, dial).await {
            Ok(connection) => {
                let connection = connection?;
                debug!(mode = ?self.mode, "redis connection established");
                Ok(connection)
            }
            Err(_) => Err(StoreError::Connection(format!(
                "dialing {:?} timed out after {:?}",
                self.mode, timeout
            ))),
        }
    }

    async fn dispatch<T: FromRedisValue>(
        &self,
        mut connection: Connection,
        cmd: &Cmd,
    ) -> Result<T, StoreError> {
        let deadline = self.options.response_timeout();
        let round_trip = async {
            match &mut connection {
                Connection::Standalone(conn) => cmd.query_async(conn).await,
                Connection::Cluster(conn) => cmd.query_async(conn).await,
            }
        };

        match tokio::time::timeout(deadline, round_trip).await {
            Ok(reply) => reply.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(deadline)),
        }
    }

    /// 在给定连接上执行命令并通知钩子
    async fn run<T: FromRedisValue>(
        &self,
        connection: Connection,
        command: &'static str,
        keys: &[&str],
        cmd: &Cmd,
    ) -> Result<T, StoreError> {
        let started = Instant::now();
        let result = self.dispatch(connection, cmd).await;
        self.notify(command, keys, started.elapsed(), result.as_ref().err());
        result
    }

    async fn query<T: FromRedisValue>(
        &self,
        command: &'static str,
        keys: &[&str],
        cmd: &Cmd,
    ) -> Result<T, StoreError> {
        let connection = match self.connection().await {
            Ok(connection) => connection,
            Err(err) => {
                self.notify(command, keys, Duration::ZERO, Some(&err));
                return Err(err);
            }
        };
        self.run(connection, command, keys, cmd).await
    }

    fn notify(
        &self,
        command: &'static str,
        keys: &[&str],
        elapsed: Duration,
        error: Option<&StoreError>,
    ) {
        let hooks = self.hooks.snapshot();
        if hooks.is_empty() {
            return;
        }

        let event = CommandEvent {
            command,
            key: keys.first().copied(),
            key_count: keys.len(),
            elapsed,
            error,
        };
        for hook in hooks {
            hook.after_command(&event);
        }
    }
}

/// 构造带过期时间的 SET 命令
///
/// 整秒使用 `EX`，否则使用 `PX`；不足一毫秒按一毫秒处理。
fn set_command(key: &str, value: &[u8], ttl: Duration) -> Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    apply_ttl(&mut cmd, ttl);
    cmd
}

fn apply_ttl(cmd: &mut Cmd, ttl: Duration) {
    if ttl.is_zero() {
        return;
    }

    if ttl.subsec_nanos() == 0 {
        cmd.arg("EX").arg(ttl.as_secs());
    } else {
        cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
    }
}

/// 汇总批量写入结果，失败按键排序
fn aggregate_writes(results: Vec<(String, Result<(), StoreError>)>) -> Result<(), StoreError> {
    let mut failures: Vec<KeyFailure> = results
        .into_iter()
        .filter_map(|(key, result)| {
            result.err().map(|err| KeyFailure {
                key,
                cause: err.to_string(),
            })
        })
        .collect();

    if failures.is_empty() {
        return Ok(());
    }

    failures.sort_by(|a, b| a.key.cmp(&b.key));
    Err(StoreError::AggregateWrite { failures })
}

#[async_trait]
impl Cache for RedisCache {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.set_exp(key, value, Duration::ZERO).await
    }

    async fn set_exp(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let cmd = set_command(key, value, ttl);
        self.query::<()>("SET", &[key], &cmd).await
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, StoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        apply_ttl(&mut cmd, ttl);

        let reply: Option<String> = self.query("SET", &[key], &cmd).await?;
        Ok(reply.is_some())
    }

    async fn set_exp_pipe(
        &self,
        values: HashMap<String, Vec<u8>>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }

        let connection = match self.connection().await {
            Ok(connection) => connection,
            Err(err) => {
                let mut keys: Vec<&str> = values.keys().map(String::as_str).collect();
                keys.sort_unstable();
                self.notify("SET", &keys, Duration::ZERO, Some(&err));
                return Err(err);
            }
        };
        let writes = values.iter().map(|(key, value)| {
            let connection = connection.clone();
            async move {
                let cmd = set_command(key, value, ttl);
                let result = self
                    .run::<()>(connection, "SET", &[key.as_str()], &cmd)
                    .await;
                (key.clone(), result)
            }
        });

        // 所有写入完成后再检查结果
        let results = join_all(writes).await;
        aggregate_writes(results)
    }

    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);

        let value: Option<Vec<u8>> = self.query("GET", &[key], &cmd).await?;
        value.ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }

    async fn mget_bytes(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("MGET");
        cmd.arg(keys);

        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.query("MGET", &key_refs, &cmd).await
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut cmd = redis::cmd("DEL");
        cmd.arg(keys);

        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.query("DEL", &key_refs, &cmd).await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut cmd = redis::cmd("INCR");
        cmd.arg(key);
        self.query("INCR", &[key], &cmd).await
    }

    async fn decr(&self, key: &str) -> Result<i64, StoreError> {
        let mut cmd = redis::cmd("DECR");
        cmd.arg(key);
        self.query("DECR", &[key], &cmd).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut cmd = redis::cmd("KEYS");
        cmd.arg(pattern);
        self.query("KEYS", &[pattern], &cmd).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let cmd = redis::cmd("PING");
        self.query::<()>("PING", &[], &cmd).await
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Closed);
        }

        slot.take();
        info!(mode = ?self.mode, "redis cache client closed");
        Ok(())
    }

    fn hashed(&self) -> Result<&dyn CacheHashed, StoreError> {
        Ok(self)
    }

    fn as_instrumentable(&self) -> Option<&dyn Instrumentable<dyn CommandHook>> {
        Some(self)
    }
}

#[async_trait]
impl CacheHashed for RedisCache {
    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<bool, StoreError> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key).arg(field).arg(value);

        let added: i64 = self.query("HSET", &[key], &cmd).await?;
        Ok(added > 0)
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let mut cmd = redis::cmd("HEXISTS");
        cmd.arg(key).arg(field);
        self.query("HEXISTS", &[key], &cmd).await
    }

    async fn hget_bytes(&self, key: &str, field: &str) -> Result<Vec<u8>, StoreError> {
        let mut cmd = redis::cmd("HGET");
        cmd.arg(key).arg(field);

        let value: Option<Vec<u8>> = self.query("HGET", &[key], &cmd).await?;
        value.ok_or_else(|| StoreError::NotFound {
            key: format!("{}.{}", key, field),
        })
    }
}

impl Instrumentable<dyn CommandHook> for RedisCache {
    fn add_hook(&self, hook: Arc<dyn CommandHook>) {
        self.hooks.push(hook);
    }

    fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}
