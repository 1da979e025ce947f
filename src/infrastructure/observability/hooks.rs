// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::RwLock;
use sea_orm::Statement;
use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::database::session::SessionValues;
use crate::utils::errors::StoreError;

/// 一次缓存命令执行完成后的事件
#[derive(Debug)]
pub struct CommandEvent<'a> {
    /// 命令名，如 `SET`、`MGET`
    pub command: &'static str,
    /// 命令作用的第一个键（无键命令为 `None`）
    pub key: Option<&'a str>,
    /// 命令涉及的键数量
    pub key_count: usize,
    /// 往返耗时
    pub elapsed: Duration,
    /// 失败时的错误
    pub error: Option<&'a StoreError>,
}

/// 一次 SQL 执行完成后的事件
#[derive(Debug)]
pub struct QueryEvent<'a> {
    /// 操作名，如 `first`、`create`、`exec`
    pub operation: &'static str,
    /// 目标表（原始 SQL 为空字符串）
    pub table: &'a str,
    /// 实际发送的语句
    pub statement: Option<&'a Statement>,
    pub elapsed: Duration,
    /// 写操作影响的行数
    pub rows_affected: Option<u64>,
    pub error: Option<&'a StoreError>,
    /// 会话上附加的值
    pub session: &'a SessionValues,
}

/// 缓存命令钩子
pub trait CommandHook: Send + Sync {
    fn after_command(&self, event: &CommandEvent<'_>);
}

/// SQL 查询钩子
pub trait QueryHook: Send + Sync {
    fn after_query(&self, event: &QueryEvent<'_>);
}

/// 可挂载钩子的能力接口
///
/// 遥测挂载函数只依赖此接口，不对具体类型做运行时判断。
pub trait Instrumentable<H: ?Sized> {
    /// 注册钩子，对之后的所有调用生效
    fn add_hook(&self, hook: Arc<H>);

    /// 已注册的钩子数量
    fn hook_count(&self) -> usize;
}

/// 共享的钩子列表
///
/// 克隆出的句柄共享同一列表，挂载后对所有派生会话可见。
pub(crate) struct HookList<H: ?Sized> {
    hooks: Arc<RwLock<Vec<Arc<H>>>>,
}

impl<H: ?Sized> HookList<H> {
    pub(crate) fn new() -> Self {
        Self {
            hooks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub(crate) fn push(&self, hook: Arc<H>) {
        self.hooks.write().push(hook);
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.read().len()
    }

    /// 当前钩子的快照，调用钩子时不持有锁
    pub(crate) fn snapshot(&self) -> Vec<Arc<H>> {
        self.hooks.read().clone()
    }
}

impl<H: ?Sized> Clone for HookList<H> {
    fn clone(&self) -> Self {
        Self {
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<H: ?Sized> Default for HookList<H> {
    fn default() -> Self {
        Self::new()
    }
}
