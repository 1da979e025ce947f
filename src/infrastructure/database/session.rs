// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, EntityTrait, Statement, TransactionTrait, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::infrastructure::database::orm::OrmTransaction;
use crate::infrastructure::database::query::Query;
use crate::infrastructure::database::raw::RawQuery;
use crate::infrastructure::observability::hooks::{HookList, QueryEvent, QueryHook};
use crate::utils::errors::StoreError;

type SharedValue = Arc<dyn Any + Send + Sync>;

/// 会话值
///
/// 供钩子读取的键值对，不会写入数据库。写时复制，派生会话互不影响。
#[derive(Clone, Default)]
pub struct SessionValues {
    values: Arc<HashMap<String, SharedValue>>,
}

impl SessionValues {
    /// 返回附加了新值的副本
    pub fn with<V>(&self, key: impl Into<String>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        let mut values = (*self.values).clone();
        values.insert(key.into(), Arc::new(value));
        Self {
            values: Arc::new(values),
        }
    }

    /// 按类型读取值，键不存在或类型不符时返回 `None`
    pub fn get<V: Any>(&self, key: &str) -> Option<&V> {
        self.values.get(key).and_then(|v| v.as_ref().downcast_ref::<V>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for SessionValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("SessionValues").field("keys", &keys).finish()
    }
}

/// 会话上下文：钩子、会话值、截止时间以及写操作是否自动包裹事务
#[derive(Clone, Default)]
pub struct SessionContext {
    pub(crate) hooks: HookList<dyn QueryHook>,
    pub(crate) values: SessionValues,
    pub(crate) timeout: Option<Duration>,
    pub(crate) wrap_writes: bool,
}

impl SessionContext {
    pub(crate) fn new(wrap_writes: bool) -> Self {
        Self {
            wrap_writes,
            ..Default::default()
        }
    }

    /// 事务内的写操作不再单独包裹事务
    pub(crate) fn for_transaction(&self) -> Self {
        Self {
            wrap_writes: false,
            ..self.clone()
        }
    }

    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 执行一次数据库调用：应用截止时间并通知钩子
    pub(crate) async fn observe<T, F>(
        &self,
        operation: &'static str,
        table: &str,
        statement: Option<&Statement>,
        rows_of: fn(&T) -> Option<u64>,
        call: F,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let started = Instant::now();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(limit)),
            },
            None => call.await,
        };

        let hooks = self.hooks.snapshot();
        if !hooks.is_empty() {
            let event = QueryEvent {
                operation,
                table,
                statement,
                elapsed: started.elapsed(),
                rows_affected: result.as_ref().ok().and_then(rows_of),
                error: result.as_ref().err(),
                session: &self.values,
            };
            for hook in hooks {
                hook.after_query(&event);
            }
        }

        result
    }
}

pub(crate) fn no_rows<T>(_: &T) -> Option<u64> {
    None
}

pub(crate) fn affected_rows(rows: &u64) -> Option<u64> {
    Some(*rows)
}

/// ORM 会话接口
///
/// 由连接池句柄 [`Orm`](crate::infrastructure::database::orm::Orm)
/// 和事务句柄 [`OrmTransaction`] 实现。
#[async_trait]
pub trait Session: Send + Sync {
    type Connection: ConnectionTrait + TransactionTrait + Send + Sync;

    fn connection(&self) -> &Self::Connection;

    fn context(&self) -> &SessionContext;

    /// 以实体 `E` 对应的表开始构建查询
    fn model<E: EntityTrait>(&self) -> Query<'_, E, Self::Connection> {
        Query::new(self.connection(), self.context().clone())
    }

    /// 参数化原始 SQL 查询
    fn raw(&self, sql: &str, values: Vec<Value>) -> RawQuery<'_, Self::Connection> {
        RawQuery::new(self.connection(), self.context().clone(), sql, values)
    }

    /// 执行参数化原始 SQL，返回影响的行数
    async fn exec(&self, sql: &str, values: Vec<Value>) -> Result<u64, StoreError> {
        let conn = self.connection();
        let statement = Statement::from_sql_and_values(conn.get_database_backend(), sql, values);

        self.context()
            .observe("exec", "", Some(&statement), affected_rows, async {
                Ok(conn.execute(statement.clone()).await?.rows_affected())
            })
            .await
    }

    /// 开启事务；在事务上调用时创建保存点
    async fn begin(&self) -> Result<OrmTransaction, StoreError> {
        let context = self.context().for_transaction();
        let conn = self.connection();

        let txn = context
            .observe("begin", "", None, no_rows, async { Ok(conn.begin().await?) })
            .await?;
        Ok(OrmTransaction::new(txn, context))
    }
}
