//! 错误类型

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// 同步错误
#[derive(Error, Debug)]
pub enum SyncError {
    /// 启动参数无效，进入调度循环前直接失败
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 根目录不存在或不是目录
    #[error("目录不存在: {}", .0.display())]
    NotFound(PathBuf),

    /// 单个条目的文件系统操作失败
    #[error("{op} 失败 {}: {source}", .path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 复制/删除工作任务异常退出
    #[error("工作任务失败: {0}")]
    Worker(String),
}

impl SyncError {
    pub fn fs(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }

    /// 条目在列出之后被外部删除
    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::NotFound(_) => true,
            SyncError::Filesystem { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
