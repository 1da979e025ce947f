// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, histogram, Label};
use sea_orm::DbBackend;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::repositories::cache_repository::Cache;
use crate::infrastructure::observability::hooks::{
    CommandEvent, CommandHook, Instrumentable, QueryEvent, QueryHook,
};
use crate::infrastructure::observability::metrics::{
    describe_metrics, CACHE_COMMANDS_TOTAL, CACHE_COMMAND_DURATION_SECONDS, DB_QUERIES_TOTAL,
    DB_QUERY_DURATION_SECONDS,
};

/// 语句格式化函数
pub type QueryFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// 遥测选项
#[derive(Clone, Default)]
pub struct TelemetryOptions {
    without_metrics: bool,
    without_query_variables: bool,
    attributes: Vec<(String, String)>,
    db_name: Option<String>,
    query_formatter: Option<QueryFormatter>,
}

impl TelemetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只输出追踪，不记录指标
    pub fn without_metrics(mut self) -> Self {
        self.without_metrics = true;
        self
    }

    /// 语句中不包含参数值
    pub fn without_query_variables(mut self) -> Self {
        self.without_query_variables = true;
        self
    }

    /// 附加到每个事件和指标上的属性
    pub fn with_attributes<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = Some(name.into());
        self
    }

    /// 输出前改写语句文本，例如脱敏或截断
    pub fn with_query_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.query_formatter = Some(Arc::new(formatter));
        self
    }

    fn format(&self, statement: String) -> String {
        match &self.query_formatter {
            Some(formatter) => formatter(&statement),
            None => statement,
        }
    }

    fn labels(&self, mut labels: Vec<Label>) -> Vec<Label> {
        if let Some(name) = &self.db_name {
            labels.push(Label::new("db_name", name.clone()));
        }
        labels.extend(
            self.attributes
                .iter()
                .map(|(k, v)| Label::new(k.clone(), v.clone())),
        );
        labels
    }

    fn attributes_field(&self) -> String {
        self.attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Debug for TelemetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryOptions")
            .field("without_metrics", &self.without_metrics)
            .field("without_query_variables", &self.without_query_variables)
            .field("attributes", &self.attributes)
            .field("db_name", &self.db_name)
            .field("query_formatter", &self.query_formatter.is_some())
            .finish()
    }
}

/// 追踪与指标钩子
///
/// 每条命令或语句生成一个 span 和一条事件，未禁用时同时记录计数与耗时。
#[derive(Debug, Clone)]
pub struct TracingHook {
    options: TelemetryOptions,
}

impl TracingHook {
    pub fn new(options: TelemetryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TelemetryOptions {
        &self.options
    }

    pub(crate) fn command_statement(&self, event: &CommandEvent<'_>) -> String {
        let statement = match (self.options.without_query_variables, event.key) {
            (false, Some(key)) if event.key_count > 1 => {
                format!("{} {} (+{} keys)", event.command, key, event.key_count - 1)
            }
            (false, Some(key)) => format!("{} {}", event.command, key),
            _ => event.command.to_string(),
        };
        self.options.format(statement)
    }

    pub(crate) fn query_statement(&self, event: &QueryEvent<'_>) -> String {
        let statement = match event.statement {
            Some(stmt) if self.options.without_query_variables => stmt.sql.clone(),
            Some(stmt) => stmt.to_string(),
            None => String::new(),
        };
        self.options.format(statement)
    }
}

fn backend_name(event: &QueryEvent<'_>) -> &'static str {
    match event.statement.map(|s| s.db_backend) {
        Some(DbBackend::MySql) => "mysql",
        Some(DbBackend::Postgres) => "postgresql",
        Some(DbBackend::Sqlite) => "sqlite",
        None => "sql",
    }
}

impl CommandHook for TracingHook {
    fn after_command(&self, event: &CommandEvent<'_>) {
        let statement = self.command_statement(event);
        let span = tracing::debug_span!(
            "cache.command",
            db.system = "redis",
            db.name = self.options.db_name.as_deref().unwrap_or(""),
            db.operation = event.command,
            db.statement = %statement,
            attributes = %self.options.attributes_field(),
        );
        let _entered = span.enter();

        let elapsed_ms = event.elapsed.as_secs_f64() * 1000.0;
        let status = match event.error {
            Some(err) => {
                warn!(elapsed_ms, error = %err, "cache command failed");
                "error"
            }
            None => {
                debug!(elapsed_ms, "cache command completed");
                "ok"
            }
        };

        if !self.options.without_metrics {
            let labels = self.options.labels(vec![
                Label::new("command", event.command),
                Label::new("status", status),
            ]);
            counter!(CACHE_COMMANDS_TOTAL, labels.clone()).increment(1);
            histogram!(CACHE_COMMAND_DURATION_SECONDS, labels).record(event.elapsed.as_secs_f64());
        }
    }
}

impl QueryHook for TracingHook {
    fn after_query(&self, event: &QueryEvent<'_>) {
        let statement = self.query_statement(event);
        let span = tracing::debug_span!(
            "db.query",
            db.system = backend_name(event),
            db.name = self.options.db_name.as_deref().unwrap_or(""),
            db.operation = event.operation,
            db.sql.table = event.table,
            db.statement = %statement,
            attributes = %self.options.attributes_field(),
        );
        let _entered = span.enter();

        let elapsed_ms = event.elapsed.as_secs_f64() * 1000.0;
        let status = match event.error {
            Some(err) => {
                warn!(elapsed_ms, error = %err, "query failed");
                "error"
            }
            None => {
                debug!(elapsed_ms, rows_affected = ?event.rows_affected, "query completed");
                "ok"
            }
        };

        if !self.options.without_metrics {
            let labels = self.options.labels(vec![
                Label::new("operation", event.operation),
                Label::new("table", event.table.to_string()),
                Label::new("status", status),
            ]);
            counter!(DB_QUERIES_TOTAL, labels.clone()).increment(1);
            histogram!(DB_QUERY_DURATION_SECONDS, labels).record(event.elapsed.as_secs_f64());
        }
    }
}

/// 为缓存挂载追踪与指标钩子
///
/// 缓存实现未暴露挂载能力时不做任何事。
pub fn use_cache_telemetry(cache: &dyn Cache, options: TelemetryOptions) {
    let Some(target) = cache.as_instrumentable() else {
        debug!("cache implementation does not support hooks, telemetry not attached");
        return;
    };

    describe_metrics();
    target.add_hook(Arc::new(TracingHook::new(options)));
}

/// 为 ORM 句柄挂载追踪与指标钩子
pub fn use_orm_telemetry<T>(orm: &T, options: TelemetryOptions)
where
    T: Instrumentable<dyn QueryHook> + ?Sized,
{
    describe_metrics();
    orm.add_hook(Arc::new(TracingHook::new(options)));
}
