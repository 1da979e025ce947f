// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram, Unit};
use once_cell::sync::Lazy;

pub const CACHE_COMMANDS_TOTAL: &str = "storelayer_cache_commands_total";
pub const CACHE_COMMAND_DURATION_SECONDS: &str = "storelayer_cache_command_duration_seconds";
pub const DB_QUERIES_TOTAL: &str = "storelayer_db_queries_total";
pub const DB_QUERY_DURATION_SECONDS: &str = "storelayer_db_query_duration_seconds";

static DESCRIBED: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        CACHE_COMMANDS_TOTAL,
        "Total number of cache commands, labelled by command and status"
    );
    describe_histogram!(
        CACHE_COMMAND_DURATION_SECONDS,
        Unit::Seconds,
        "Round-trip duration of cache commands"
    );
    describe_counter!(
        DB_QUERIES_TOTAL,
        "Total number of SQL statements, labelled by operation, table and status"
    );
    describe_histogram!(
        DB_QUERY_DURATION_SECONDS,
        Unit::Seconds,
        "Execution duration of SQL statements"
    );
});

/// 向当前 recorder 注册指标说明（只执行一次）
pub fn describe_metrics() {
    Lazy::force(&DESCRIBED);
}
