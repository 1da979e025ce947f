// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;
use tracing::{error, info, warn};

use crate::infrastructure::observability::hooks::{QueryEvent, QueryHook};

/// 慢查询阈值
pub const SLOW_QUERY_THRESHOLD: Duration = Duration::from_secs(1);

/// 查询日志钩子
///
/// 失败的查询记为 error，超过阈值的查询记为 warn，其余记为 info。
#[derive(Debug, Clone)]
pub struct QueryLogger {
    slow_threshold: Duration,
}

impl Default for QueryLogger {
    fn default() -> Self {
        Self::new(SLOW_QUERY_THRESHOLD)
    }
}

impl QueryLogger {
    pub fn new(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    pub(crate) fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed > self.slow_threshold
    }
}

impl QueryHook for QueryLogger {
    fn after_query(&self, event: &QueryEvent<'_>) {
        let sql = event.statement.map(|s| s.sql.as_str()).unwrap_or_default();
        let elapsed_ms = event.elapsed.as_secs_f64() * 1000.0;
        let rows = event.rows_affected.unwrap_or_default();

        if let Some(err) = event.error {
            error!(
                operation = event.operation,
                table = event.table,
                sql,
                elapsed_ms,
                error = %err,
                "query failed"
            );
        } else if self.is_slow(event.elapsed) {
            warn!(
                operation = event.operation,
                table = event.table,
                sql,
                elapsed_ms,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "slow query"
            );
        } else {
            info!(
                operation = event.operation,
                table = event.table,
                sql,
                elapsed_ms,
                rows,
                "query"
            );
        }
    }
}
