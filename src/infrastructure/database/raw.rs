// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::{ConnectionTrait, FromQueryResult, Statement, Value};
use std::any::Any;
use std::time::Duration;

use crate::infrastructure::database::session::{no_rows, SessionContext};
use crate::utils::errors::StoreError;

/// 参数化原始 SQL 查询
pub struct RawQuery<'c, C> {
    conn: &'c C,
    ctx: SessionContext,
    sql: String,
    values: Vec<Value>,
}

impl<'c, C> RawQuery<'c, C>
where
    C: ConnectionTrait,
{
    pub(crate) fn new(conn: &'c C, ctx: SessionContext, sql: &str, values: Vec<Value>) -> Self {
        Self {
            conn,
            ctx,
            sql: sql.to_string(),
            values,
        }
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

    fn statement(&self) -> Statement {
        Statement::from_sql_and_values(
            self.conn.get_database_backend(),
            self.sql.as_str(),
            self.values.clone(),
        )
    }

    /// 读取所有结果行
    pub async fn find<T>(self) -> Result<Vec<T>, StoreError>
    where
        T: FromQueryResult,
    {
        let statement = self.statement();
        let conn = self.conn;

        self.ctx
            .observe("raw", "", Some(&statement), no_rows, async {
                Ok(T::find_by_statement(statement.clone()).all(conn).await?)
            })
            .await
    }

    /// 读取第一行，没有结果时返回 `None`
    pub async fn scan<T>(self) -> Result<Option<T>, StoreError>
    where
        T: FromQueryResult,
    {
        let statement = self.statement();
        let conn = self.conn;

        self.ctx
            .observe("raw", "", Some(&statement), no_rows, async {
                Ok(T::find_by_statement(statement.clone()).one(conn).await?)
            })
            .await
    }
}
