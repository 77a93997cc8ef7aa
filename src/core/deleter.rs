use crate::config::DeleteStrategy;
use crate::core::events::{EventSink, SyncEvent};
use crate::core::scanner::Inventory;
use crate::error::SyncError;
use std::fs;
use std::io;
use std::path::Path;

/// 删除阶段统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteStats {
    pub files_deleted: usize,
    pub dirs_deleted: usize,
    pub failures: usize,
}

/// 删除副本中在源清单里没有对应项的条目
///
/// 两份清单都在本轮复制开始前生成。条目在列出后已消失（包括已被删除目录的子项）时直接跳过。
pub fn delete_orphans(
    source: &Inventory,
    replica: &Inventory,
    replica_root: &Path,
    strategy: DeleteStrategy,
    sink: &dyn EventSink,
) -> DeleteStats {
    let mut stats = DeleteStats::default();

    if strategy == DeleteStrategy::Fast && replica.len() <= source.len() {
        tracing::debug!(
            "副本条目数 ({}) 不多于源 ({})，跳过删除",
            replica.len(),
            source.len()
        );
        return stats;
    }

    let known = source.as_set();

    for relative in replica.iter().filter(|p| !known.contains(p)) {
        let path = replica_root.join(relative);

        let metadata = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) if vanished(&e) => continue,
            Err(e) => {
                stats.failures += 1;
                sink.record(SyncEvent::EntryFailed {
                    error: SyncError::fs("读取元数据", &path, e),
                });
                continue;
            }
        };

        let result = if metadata.is_dir() {
            fs::remove_dir_all(&path).map(|_| SyncEvent::TreeDeleted { path: path.clone() })
        } else {
            fs::remove_file(&path).map(|_| SyncEvent::FileDeleted { path: path.clone() })
        };

        match result {
            Ok(event) => {
                if metadata.is_dir() {
                    stats.dirs_deleted += 1;
                } else {
                    stats.files_deleted += 1;
                }
                sink.record(event);
            }
            Err(e) if vanished(&e) => {}
            Err(e) => {
                let op = if metadata.is_dir() { "删除目录" } else { "删除文件" };
                stats.failures += 1;
                sink.record(SyncEvent::EntryFailed {
                    error: SyncError::fs(op, &path, e),
                });
            }
        }
    }

    stats
}

/// 条目已不存在。复制阶段把同名目录替换成文件后，原目录下的子项会报 NotADirectory。
fn vanished(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
