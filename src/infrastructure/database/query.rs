// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::sea_query::{CaseStatement, Expr, IntoCondition, OnConflict, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait,
    FromQueryResult, IntoSimpleExpr, Iterable, JoinType, ModelTrait,
    PaginatorTrait, PrimaryKeyToColumn, QueryFilter, QueryOrder, QuerySelect, QueryTrait,
    Related, RelationDef, Select, Statement, TransactionTrait, Value,
};
use std::any::Any;
use std::time::Duration;

use crate::infrastructure::database::session::{affected_rows, no_rows, SessionContext};
use crate::utils::errors::StoreError;

/// 链式查询构建器
///
/// 每一步只累积状态；发现问题时记录到延迟错误槽，
/// 由下一次终结调用（`first`、`find`、`create` 等）返回。
/// 第一条记录的错误优先，后续错误被忽略。
pub struct Query<'c, E: EntityTrait, C> {
    conn: &'c C,
    ctx: SessionContext,
    condition: Condition,
    has_condition: bool,
    columns: Option<Vec<E::Column>>,
    orders: Vec<(SimpleExpr, sea_orm::Order)>,
    joins: Vec<RelationDef>,
    offset: Option<u64>,
    limit: Option<u64>,
    on_conflict: Option<OnConflict>,
    error: Option<StoreError>,
}

struct Parts<'c, E: EntityTrait, C> {
    conn: &'c C,
    ctx: SessionContext,
    select: Select<E>,
    table: String,
}

impl<'c, E, C> Query<'c, E, C>
where
    E: EntityTrait,
    C: ConnectionTrait + TransactionTrait,
{
    pub(crate) fn new(conn: &'c C, ctx: SessionContext) -> Self {
        Self {
            conn,
            ctx,
            condition: Condition::all(),
            has_condition: false,
            columns: None,
            orders: Vec::new(),
            joins: Vec::new(),
            offset: None,
            limit: None,
            on_conflict: None,
            error: None,
        }
    }

    /// 已记录的延迟错误
    pub fn error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }

    fn defer(&mut self, err: StoreError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn table() -> String {
        E::default().table_name().to_string()
    }

    /// 附加会话值，供钩子读取
    pub fn set<V>(mut self, key: impl Into<String>, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        self.ctx.values = self.ctx.values.with(key, value);
        self
    }

    /// 为后续终结调用设置截止时间，并清空延迟错误
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.ctx.timeout = Some(timeout);
        self.error = None;
        self
    }

    /// 只查询指定列
    pub fn select<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = E::Column>,
    {
        let columns: Vec<E::Column> = columns.into_iter().collect();
        if columns.is_empty() {
            self.defer(StoreError::InvalidQuery(
                "select requires at least one column".to_string(),
            ));
            return self;
        }
        self.columns = Some(columns);
        self
    }

    /// 追加过滤条件（与已有条件为 AND 关系）
    pub fn filter<F: IntoCondition>(mut self, condition: F) -> Self {
        self.condition = self.condition.add(condition.into_condition());
        self.has_condition = true;
        self
    }

    /// 追加参数化的原始过滤条件，`?` 为占位符
    ///
    /// 引号内的 `?` 不计为占位符。Postgres 的 JSON `?` 运算符
    /// 无法与占位符区分，这类条件请改用 [`Query::filter`]。
    pub fn where_raw(mut self, sql: &str, values: Vec<Value>) -> Self {
        let placeholders = count_placeholders(sql);
        if placeholders != values.len() {
            self.defer(StoreError::InvalidQuery(format!(
                "`{}` has {} placeholders but {} values were given",
                sql,
                placeholders,
                values.len()
            )));
            return self;
        }
        self.filter(Expr::cust_with_values(sql, values))
    }

    pub fn order_by(mut self, column: E::Column, order: sea_orm::Order) -> Self {
        self.orders.push((column.into_simple_expr(), order));
        self
    }

    pub fn order_by_asc(self, column: E::Column) -> Self {
        self.order_by(column, sea_orm::Order::Asc)
    }

    pub fn order_by_desc(self, column: E::Column) -> Self {
        self.order_by(column, sea_orm::Order::Desc)
    }

    /// 按给定值列表的顺序排序
    ///
    /// 生成 `CASE WHEN col = ? THEN 0 ... ELSE n END`，值以参数绑定；
    /// 不在列表中的行排在最后。
    pub fn order_by_field<V, I>(mut self, column: E::Column, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.defer(StoreError::InvalidQuery(
                "order_by_field requires at least one value".to_string(),
            ));
            return self;
        }

        let rank = values.len() as i64;
        let case = values
            .into_iter()
            .enumerate()
            .fold(CaseStatement::new(), |case, (position, value)| {
                case.case(column.eq(value), Expr::val(position as i64))
            })
            .finally(Expr::val(rank));

        self.orders
            .push((SimpleExpr::Case(Box::new(case)), sea_orm::Order::Asc));
        self
    }

    /// 左连接关联表
    pub fn joins(mut self, relation: RelationDef) -> Self {
        self.joins.push(relation);
        self
    }

    /// 写入时不级联保存关联实体
    ///
    /// 写操作本来就只作用于本表，因此这里不改变构建器；
    /// 已登记的 `joins` 仍参与读取和过滤。
    pub fn omit_assoc(self) -> Self {
        self
    }

    /// 同时加载关联实体
    pub fn preload<R>(self, related: R) -> Preload<'c, E, R, C>
    where
        R: EntityTrait,
        E: Related<R>,
    {
        Preload {
            query: self,
            related,
        }
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// 唯一约束冲突时更新指定列（空列表表示忽略冲突）
    pub fn on_conflict<I, U>(mut self, conflict_columns: I, update_columns: U) -> Self
    where
        I: IntoIterator<Item = E::Column>,
        U: IntoIterator<Item = E::Column>,
    {
        let conflict: Vec<E::Column> = conflict_columns.into_iter().collect();
        let updates: Vec<E::Column> = update_columns.into_iter().collect();

        if conflict.is_empty() {
            self.defer(StoreError::InvalidQuery(
                "on_conflict requires at least one conflict column".to_string(),
            ));
            return self;
        }

        let mut clause = OnConflict::columns(conflict);
        if updates.is_empty() {
            clause.do_nothing();
        } else {
            clause.update_columns(updates);
        }
        self.on_conflict = Some(clause);
        self
    }

    fn into_parts(self) -> Result<Parts<'c, E, C>, StoreError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut select = E::find();

        if let Some(columns) = self.columns {
            select = select.select_only();
            for column in columns {
                select = select.column(column);
            }
        }
        for relation in self.joins {
            select = select.join(JoinType::LeftJoin, relation);
        }
        if self.has_condition {
            select = select.filter(self.condition);
        }
        for (expr, order) in self.orders {
            select = select.order_by(expr, order);
        }
        if let Some(offset) = self.offset {
            select = select.offset(offset);
        }
        if let Some(limit) = self.limit {
            select = select.limit(limit);
        }

        Ok(Parts {
            conn: self.conn,
            ctx: self.ctx,
            select,
            table: Self::table(),
        })
    }

    fn take_error(&mut self) -> Result<(), StoreError> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// 按主键升序取第一行，无结果时返回 `DbErr::RecordNotFound`
    pub async fn first<T>(self) -> Result<T, StoreError>
    where
        T: FromQueryResult + Send + Sync,
    {
        self.fetch_edge("first", sea_orm::Order::Asc).await
    }

    /// 按主键降序取第一行，无结果时返回 `DbErr::RecordNotFound`
    pub async fn last<T>(self) -> Result<T, StoreError>
    where
        T: FromQueryResult + Send + Sync,
    {
        self.fetch_edge("last", sea_orm::Order::Desc).await
    }

    async fn fetch_edge<T>(
        mut self,
        operation: &'static str,
        order: sea_orm::Order,
    ) -> Result<T, StoreError>
    where
        T: FromQueryResult + Send + Sync,
    {
        for key in E::PrimaryKey::iter() {
            self.orders
                .push((key.into_column().into_simple_expr(), order.clone()));
        }
        self.limit = Some(1);
        self.fetch_one(operation).await
    }

    async fn fetch_one<T>(self, operation: &'static str) -> Result<T, StoreError>
    where
        T: FromQueryResult + Send + Sync,
    {
        let table = Self::table();
        self.fetch_optional(operation).await?.ok_or_else(|| {
            StoreError::Database(DbErr::RecordNotFound(format!(
                "no row in `{}` matched the query",
                table
            )))
        })
    }

    async fn fetch_optional<T>(self, operation: &'static str) -> Result<Option<T>, StoreError>
    where
        T: FromQueryResult + Send + Sync,
    {
        let Parts {
            conn,
            ctx,
            select,
            table,
        } = self.into_parts()?;
        let statement = select.build(conn.get_database_backend());

        ctx.observe(operation, &table, Some(&statement), no_rows, async {
            Ok(select.into_model::<T>().one(conn).await?)
        })
        .await
    }

    /// 返回所有匹配行
    pub async fn find<T>(self) -> Result<Vec<T>, StoreError>
    where
        T: FromQueryResult + Send + Sync,
    {
        let Parts {
            conn,
            ctx,
            select,
            table,
        } = self.into_parts()?;
        let statement = select.build(conn.get_database_backend());

        ctx.observe("find", &table, Some(&statement), no_rows, async {
            Ok(select.into_model::<T>().all(conn).await?)
        })
        .await
    }

    /// 按原样读取单行，不附加主键排序；没有匹配行时返回 `None`
    pub async fn scan<T>(self) -> Result<Option<T>, StoreError>
    where
        T: FromQueryResult + Send + Sync,
    {
        self.fetch_optional("scan").await
    }

    /// 匹配行数
    pub async fn count(self) -> Result<u64, StoreError>
    where
        E::Model: Sync,
    {
        let Parts {
            conn,
            ctx,
            select,
            table,
        } = self.into_parts()?;
        let statement = select.build(conn.get_database_backend());

        ctx.observe("count", &table, Some(&statement), no_rows, async {
            Ok(select.count(conn).await?)
        })
        .await
    }

    /// 插入一行，已配置 `on_conflict` 时按冲突策略处理
    pub async fn create<A>(self, model: A) -> Result<u64, StoreError>
    where
        A: ActiveModelTrait<Entity = E>,
    {
        self.insert("create", vec![model]).await
    }

    /// 批量插入
    pub async fn create_many<A, I>(self, models: I) -> Result<u64, StoreError>
    where
        A: ActiveModelTrait<Entity = E>,
        I: IntoIterator<Item = A>,
    {
        self.insert("create_many", models.into_iter().collect()).await
    }

    async fn insert<A>(mut self, operation: &'static str, models: Vec<A>) -> Result<u64, StoreError>
    where
        A: ActiveModelTrait<Entity = E>,
    {
        self.take_error()?;
        if models.is_empty() {
            return Err(StoreError::InvalidQuery(
                "create requires at least one row".to_string(),
            ));
        }

        let mut insert = E::insert_many(models);
        if let Some(clause) = self.on_conflict.take() {
            insert = insert.on_conflict(clause);
        }

        let statement = insert.build(self.conn.get_database_backend());
        self.execute_write(operation, statement).await
    }

    /// 更新非空字段
    ///
    /// 有过滤条件时按条件更新，否则按活动模型中的主键更新。
    pub async fn update<A>(mut self, model: A) -> Result<u64, StoreError>
    where
        A: ActiveModelTrait<Entity = E>,
    {
        self.take_error()?;

        if !E::Column::iter().any(|column| model.get(column).is_set()) {
            return Ok(0);
        }

        let condition = if self.has_condition {
            std::mem::replace(&mut self.condition, Condition::all())
        } else {
            primary_key_condition::<E, A>(&model)?
        };

        let statement = E::update_many()
            .set(model)
            .filter(condition)
            .build(self.conn.get_database_backend());
        self.execute_write("update", statement).await
    }

    /// 直接更新指定列，需要过滤条件
    pub async fn update_columns(
        mut self,
        values: Vec<(E::Column, Value)>,
    ) -> Result<u64, StoreError> {
        self.take_error()?;
        self.require_condition("update_columns")?;

        if values.is_empty() {
            return Ok(0);
        }

        let mut update = E::update_many();
        for (column, value) in values {
            update = update.col_expr(column, Expr::value(value));
        }

        let condition = std::mem::replace(&mut self.condition, Condition::all());
        let statement = update
            .filter(condition)
            .build(self.conn.get_database_backend());
        self.execute_write("update_columns", statement).await
    }

    /// 删除匹配行，需要过滤条件
    pub async fn delete(mut self) -> Result<u64, StoreError> {
        self.take_error()?;
        self.require_condition("delete")?;

        let condition = std::mem::replace(&mut self.condition, Condition::all());
        let statement = E::delete_many()
            .filter(condition)
            .build(self.conn.get_database_backend());
        self.execute_write("delete", statement).await
    }

    fn require_condition(&self, operation: &str) -> Result<(), StoreError> {
        if self.has_condition {
            Ok(())
        } else {
            Err(StoreError::InvalidQuery(format!(
                "{} without a where clause is not allowed",
                operation
            )))
        }
    }

    async fn execute_write(
        self,
        operation: &'static str,
        statement: Statement,
    ) -> Result<u64, StoreError> {
        let conn = self.conn;
        let wrap = self.ctx.wrap_writes;
        let table = Self::table();

        self.ctx
            .observe(operation, &table, Some(&statement), affected_rows, async {
                if wrap {
                    let txn = conn.begin().await?;
                    let rows = txn.execute(statement.clone()).await?.rows_affected();
                    txn.commit().await?;
                    Ok(rows)
                } else {
                    Ok(conn.execute(statement.clone()).await?.rows_affected())
                }
            })
            .await
    }
}

/// 统计引号之外的 `?` 个数
fn count_placeholders(sql: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut count = 0;
    for ch in sql.chars() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '?') => count += 1,
            (None, _) => {}
        }
    }
    count
}

/// 由活动模型的主键值构造条件
fn primary_key_condition<E, A>(model: &A) -> Result<Condition, StoreError>
where
    E: EntityTrait,
    A: ActiveModelTrait<Entity = E>,
{
    let mut condition = Condition::all();
    for key in E::PrimaryKey::iter() {
        let column = key.into_column();
        match model.get(column) {
            ActiveValue::Set(value) | ActiveValue::Unchanged(value) => {
                condition = condition.add(column.eq(value));
            }
            ActiveValue::NotSet => {
                return Err(StoreError::InvalidQuery(
                    "update requires a where clause or a primary key value".to_string(),
                ));
            }
        }
    }
    Ok(condition)
}

/// 带关联预加载的查询
pub struct Preload<'c, E: EntityTrait, R, C> {
    query: Query<'c, E, C>,
    related: R,
}

impl<'c, E, R, C> Preload<'c, E, R, C>
where
    E: EntityTrait + Related<R>,
    R: EntityTrait,
    C: ConnectionTrait + TransactionTrait,
{
    /// 返回所有匹配行及其关联行
    pub async fn find(self) -> Result<Vec<(E::Model, Vec<R::Model>)>, StoreError> {
        let Parts {
            conn,
            ctx,
            select,
            table,
        } = self.query.into_parts()?;
        let select = select.find_with_related(self.related);
        let statement = select.build(conn.get_database_backend());

        ctx.observe("preload", &table, Some(&statement), no_rows, async {
            Ok(select.all(conn).await?)
        })
        .await
    }

    /// 返回第一行及其关联行
    pub async fn first(self) -> Result<(E::Model, Vec<R::Model>), StoreError>
    where
        E::Model: Sync,
    {
        let conn = self.query.conn;
        let ctx = self.query.ctx.clone();
        let parent: E::Model = self.query.first().await?;

        let select = parent.find_related(self.related);
        let statement = select.build(conn.get_database_backend());
        let related_table = R::default().table_name().to_string();

        let children = ctx
            .observe("preload", &related_table, Some(&statement), no_rows, async {
                Ok(select.all(conn).await?)
            })
            .await?;
        Ok((parent, children))
    }
}
