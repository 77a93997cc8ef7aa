//! 同步事件与日志输出
//!
//! 各组件不直接写全局日志，而是把事件交给注入的 [`EventSink`]。

use crate::core::engine::SyncReport;
use crate::error::SyncError;
use chrono::{DateTime, Local};
use std::fmt;
use std::path::PathBuf;
use tracing::Level;

/// 同步过程中产生的事件
#[derive(Debug)]
pub enum SyncEvent {
    PassStarted { at: DateTime<Local> },
    DirectoryCreated { path: PathBuf },
    FileCopied { from: PathBuf, to: PathBuf },
    FileDeleted { path: PathBuf },
    /// 目录连同其全部内容被删除
    TreeDeleted { path: PathBuf },
    /// 扫描时无法读取的条目
    EntrySkipped { path: PathBuf, reason: String },
    /// 单个条目处理失败，本轮继续
    EntryFailed { error: SyncError },
    PassFailed { error: SyncError },
    PassFinished { report: SyncReport },
}

impl SyncEvent {
    pub fn level(&self) -> Level {
        match self {
            SyncEvent::EntryFailed { .. } | SyncEvent::PassFailed { .. } => Level::ERROR,
            SyncEvent::EntrySkipped { .. } => Level::WARN,
            _ => Level::INFO,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::PassStarted { at } => {
                write!(f, "同步开始: {}", at.format("%a %b %e %H:%M:%S %Y"))
            }
            SyncEvent::DirectoryCreated { path } => write!(f, "已创建目录: {}", path.display()),
            SyncEvent::FileCopied { from, to } => {
                write!(f, "已复制文件: {} -> {}", from.display(), to.display())
            }
            SyncEvent::FileDeleted { path } => write!(f, "已删除文件: {}", path.display()),
            SyncEvent::TreeDeleted { path } => {
                write!(f, "已删除目录及其所有文件和子目录: {}", path.display())
            }
            SyncEvent::EntrySkipped { path, reason } => {
                write!(f, "跳过无法读取的条目 {}: {}", path.display(), reason)
            }
            SyncEvent::EntryFailed { error } => write!(f, "{}", error),
            SyncEvent::PassFailed { error } => write!(f, "同步失败: {}", error),
            SyncEvent::PassFinished { report } => write!(
                f,
                "同步完成: 创建目录 {}, 复制 {}, 未变化 {}, 删除文件 {}, 删除目录 {}, 失败 {}, 耗时 {}ms",
                report.dirs_created,
                report.files_copied,
                report.files_unchanged,
                report.files_deleted,
                report.dirs_deleted,
                report.failures,
                report.duration.as_millis()
            ),
        }
    }
}

/// 事件接收者
pub trait EventSink: Send + Sync {
    fn record(&self, event: SyncEvent);
}

/// 输出到 tracing 的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: SyncEvent) {
        match event.level() {
            Level::ERROR => tracing::error!("{}", event),
            Level::WARN => tracing::warn!("{}", event),
            _ => tracing::info!("{}", event),
        }
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingSink;
