// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::infrastructure::database::connection::{create_pool, SqlOptions};
use crate::infrastructure::database::session::{no_rows, Session, SessionContext};
use crate::infrastructure::observability::hooks::{Instrumentable, QueryHook};
use crate::infrastructure::observability::logger::QueryLogger;
use crate::utils::errors::StoreError;

/// 关系数据库门面
///
/// 克隆开销很小：克隆共享同一连接池与钩子列表，
/// 但截止时间与会话值各自独立。
#[derive(Clone)]
pub struct Orm {
    db: DatabaseConnection,
    ctx: SessionContext,
}

impl Orm {
    /// 按配置打开连接池
    pub async fn connect(options: SqlOptions) -> Result<Self, StoreError> {
        if !options.use_prepared_stmt {
            warn!("use_prepared_stmt=false has no effect, parameterized statements are always prepared");
        }

        let db = create_pool(&options).await?;
        debug!(backend = ?db.get_database_backend(), "database pool opened");

        let orm = Self::from_connection(db, options.skip_default_transaction);
        if options.log_queries {
            orm.add_hook(Arc::new(QueryLogger::default()));
        }
        Ok(orm)
    }

    /// 包装已有连接
    pub fn from_connection(db: DatabaseConnection, skip_default_transaction: bool) -> Self {
        Self {
            db,
            ctx: SessionContext::new(!skip_default_transaction),
        }
    }

    pub fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    /// 返回带截止时间的派生句柄
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut orm = self.clone();
        orm.ctx.timeout = Some(timeout);
        orm
    }

    /// 返回附加了会话值的派生句柄
    pub fn set<V>(&self, key: impl Into<String>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        let mut orm = self.clone();
        orm.ctx.values = orm.ctx.values.with(key, value);
        orm
    }

    pub fn value<V: Any>(&self, key: &str) -> Option<&V> {
        self.ctx.values.get(key)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let db = &self.db;
        self.ctx
            .observe("ping", "", None, no_rows, async { Ok(db.ping().await?) })
            .await
    }

    /// 关闭连接池
    pub async fn close(self) -> Result<(), StoreError> {
        debug!("closing database pool");
        Ok(self.db.close().await?)
    }
}

#[async_trait]
impl Session for Orm {
    type Connection = DatabaseConnection;

    fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn context(&self) -> &SessionContext {
        &self.ctx
    }
}

impl Instrumentable<dyn QueryHook> for Orm {
    fn add_hook(&self, hook: Arc<dyn QueryHook>) {
        self.ctx.hooks.push(hook);
    }

    fn hook_count(&self) -> usize {
        self.ctx.hooks.len()
    }
}

/// 事务句柄
///
/// 事务内的写操作直接执行。未提交即丢弃时由驱动回滚。
pub struct OrmTransaction {
    txn: DatabaseTransaction,
    ctx: SessionContext,
}

impl OrmTransaction {
    pub(crate) fn new(txn: DatabaseTransaction, ctx: SessionContext) -> Self {
        Self { txn, ctx }
    }

    pub async fn commit(self) -> Result<(), StoreError> {
        let Self { txn, ctx } = self;
        ctx.observe("commit", "", None, no_rows, async { Ok(txn.commit().await?) })
            .await
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        let Self { txn, ctx } = self;
        ctx.observe("rollback", "", None, no_rows, async {
            Ok(txn.rollback().await?)
        })
        .await
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.ctx.timeout = Some(timeout);
        self
    }

    pub fn set<V>(mut self, key: impl Into<String>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        self.ctx.values = self.ctx.values.with(key, value);
        self
    }
}

#[async_trait]
impl Session for OrmTransaction {
    type Connection = DatabaseTransaction;

    fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    fn context(&self) -> &SessionContext {
        &self.ctx
    }
}
