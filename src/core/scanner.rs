use crate::core::events::{EventSink, SyncEvent};
use crate::error::{Result, SyncError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 目录树快照：根目录下所有文件和目录的相对路径
///
/// 按文件名排序的深度优先顺序，父目录总在其子条目之前。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: Vec<PathBuf>,
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(PathBuf::as_path)
    }

    pub fn as_set(&self) -> HashSet<&Path> {
        self.iter().collect()
    }
}

impl FromIterator<PathBuf> for Inventory {
    fn from_iter<T: IntoIterator<Item = PathBuf>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// 列出目录树
///
/// 空目录同样会被列出，删除阶段需要据此清理副本中多余的空目录。
/// 根目录本身不在结果中；符号链接不跟随。
pub fn list_tree(root: &Path, sink: &dyn EventSink) -> Result<Inventory> {
    if !root.is_dir() {
        return Err(SyncError::NotFound(root.to_path_buf()));
    }

    let mut entries = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) => {
                if let Ok(relative) = entry.path().strip_prefix(root) {
                    entries.push(relative.to_path_buf());
                }
            }
            Err(e) => {
                // 根目录在扫描过程中消失
                if e.depth() == 0 || !root.is_dir() {
                    return Err(SyncError::NotFound(root.to_path_buf()));
                }
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                sink.record(SyncEvent::EntrySkipped {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::debug!("扫描完成: {} ({} 个条目)", root.display(), entries.len());

    Ok(Inventory { entries })
}
