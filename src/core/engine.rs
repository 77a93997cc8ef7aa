use crate::config::SyncConfig;
use crate::core::copier::{copy_tree, CopyStats};
use crate::core::deleter::{delete_orphans, DeleteStats};
use crate::core::events::{EventSink, SyncEvent};
use crate::core::scanner::{list_tree, Inventory};
use crate::error::{Result, SyncError};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tracing::debug;

/// 单轮同步报告
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    pub dirs_created: usize,
    pub files_copied: usize,
    pub files_unchanged: usize,
    pub files_deleted: usize,
    pub dirs_deleted: usize,
    pub failures: usize,
}

impl SyncReport {
    fn new(started_at: DateTime<Local>, duration: Duration, copy: CopyStats, delete: DeleteStats) -> Self {
        Self {
            started_at,
            duration,
            dirs_created: copy.dirs_created,
            files_copied: copy.files_copied,
            files_unchanged: copy.files_unchanged,
            files_deleted: delete.files_deleted,
            dirs_deleted: delete.dirs_deleted,
            failures: copy.failures + delete.failures,
        }
    }

    /// 本轮对副本做出的修改数
    pub fn changes(&self) -> usize {
        self.dirs_created + self.files_copied + self.files_deleted + self.dirs_deleted
    }
}

/// 本轮开始时的源/副本清单
pub(crate) struct Snapshot {
    started_at: DateTime<Local>,
    started: Instant,
    source: Inventory,
    replica: Inventory,
}

/// 同步引擎，每次调用 [`SyncEngine::run_pass`] 执行完整的一轮复制 + 删除
pub struct SyncEngine {
    config: SyncConfig,
    sink: Arc<dyn EventSink>,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, sink: Arc<dyn EventSink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// 执行一轮同步
    ///
    /// 先生成两份清单，再并发执行复制和删除，两者都结束后返回。
    /// 删除只依据本轮开始时的清单，在此之后从源删除的条目要到下一轮才会从副本删除。
    pub async fn run_pass(&self) -> Result<SyncReport> {
        let snapshot = self.capture().await?;
        self.apply(snapshot).await
    }

    pub(crate) async fn capture(&self) -> Result<Snapshot> {
        let started_at = Local::now();
        let started = Instant::now();
        self.sink.record(SyncEvent::PassStarted { at: started_at });

        let source = self.config.source.clone();
        let replica = self.config.replica.clone();
        let sink = self.sink.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let (source, replica) = tokio::task::spawn_blocking(move || -> Result<_> {
            let source = list_tree(&source, sink.as_ref())?;
            let replica = list_tree(&replica, sink.as_ref())?;
            Ok((source, replica))
        })
        .await
        .map_err(worker_error)??;

        debug!("清单生成完成: 源 {} 个条目, 副本 {} 个条目", source.len(), replica.len());

        Ok(Snapshot {
            started_at,
            started,
            source,
            replica,
        })
    }

    pub(crate) async fn apply(&self, snapshot: Snapshot) -> Result<SyncReport> {
        let Snapshot {
            started_at,
            started,
            source: source_inventory,
            replica: replica_inventory,
        } = snapshot;

        let copy_task = {
            let source = self.config.source.clone();
            let replica = self.config.replica.clone();
            let sink = self.sink.clone();
            tokio::task::spawn_blocking(move || copy_tree(&source, &replica, sink.as_ref()))
        };

        let delete_task = {
            let replica = self.config.replica.clone();
            let strategy = self.config.delete_strategy;
            let sink = self.sink.clone();
            tokio::task::spawn_blocking(move || {
                delete_orphans(
                    &source_inventory,
                    &replica_inventory,
                    &replica,
                    strategy,
                    sink.as_ref(),
                )
            })
        };

        // 两个任务都必须结束，即使其中一个失败
        let (copied, deleted) = tokio::join!(copy_task, delete_task);
        let copy_stats = copied.map_err(worker_error)??;
        let delete_stats = deleted.map_err(worker_error)?;

        let report = SyncReport::new(started_at, started.elapsed(), copy_stats, delete_stats);
        self.sink.record(SyncEvent::PassFinished {
            report: report.clone(),
        });
        Ok(report)
    }
}

fn worker_error(e: JoinError) -> SyncError {
    SyncError::Worker(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeleteStrategy;
    use crate::core::events::RecordingSink;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn engine(source: &Path, replica: &Path) -> (SyncEngine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let engine = SyncEngine::new(SyncConfig::new(source, replica), sink.clone());
        (engine, sink)
    }

    /// 相对路径 + 文件内容（目录为 None）
    fn tree(root: &Path) -> Vec<(PathBuf, Option<String>)> {
        WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .map(|e| {
                let e = e.unwrap();
                let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
                let content = if e.file_type().is_file() {
                    Some(fs::read_to_string(e.path()).unwrap())
                } else {
                    None
                };
                (rel, content)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_copies_into_empty_replica() {
        let source = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), "alpha").unwrap();
        fs::create_dir(source.path().join("sub")).unwrap();
        fs::write(source.path().join("sub").join("b.txt"), "beta").unwrap();

        let (engine, sink) = engine(source.path(), replica.path());
        let report = engine.run_pass().await.unwrap();

        assert_eq!(tree(replica.path()), tree(source.path()));
        assert!(replica.path().join("sub").is_dir());
        assert_eq!(report.files_copied, 2);
        assert_eq!(report.dirs_created, 1);
        assert_eq!(report.failures, 0);

        let messages = sink.messages();
        assert!(messages.first().unwrap().starts_with("同步开始"));
        assert!(messages.last().unwrap().starts_with("同步完成"));
    }

    #[tokio::test]
    async fn test_removes_extra_replica_file() {
        let source = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), "alpha").unwrap();

        let (engine, _sink) = engine(source.path(), replica.path());
        engine.run_pass().await.unwrap();
        let before = fs::metadata(replica.path().join("a.txt")).unwrap().modified().unwrap();

        fs::write(replica.path().join("old.txt"), "old").unwrap();
        let report = engine.run_pass().await.unwrap();

        assert_eq!(tree(replica.path()), tree(source.path()));
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.files_copied, 0);
        assert_eq!(report.files_unchanged, 1);
        let after = fs::metadata(replica.path().join("a.txt")).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_mirrors_empty_directory() {
        let source = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        fs::create_dir(source.path().join("dir")).unwrap();

        let (engine, _sink) = engine(source.path(), replica.path());
        engine.run_pass().await.unwrap();

        assert!(replica.path().join("dir").is_dir());
        assert_eq!(fs::read_dir(replica.path().join("dir")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_second_pass_is_noop() {
        let source = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), "alpha").unwrap();
        fs::create_dir_all(source.path().join("x").join("y")).unwrap();
        fs::write(source.path().join("x").join("y").join("z.txt"), "zeta").unwrap();
        fs::write(replica.path().join("stale.txt"), "stale").unwrap();

        let (engine, sink) = engine(source.path(), replica.path());
        let first = engine.run_pass().await.unwrap();
        assert!(first.changes() > 0);

        sink.clear();
        let second = engine.run_pass().await.unwrap();

        assert_eq!(second.changes(), 0);
        assert_eq!(second.files_unchanged, 2);
        assert_eq!(sink.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_converges_from_arbitrary_replica() {
        let source = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        fs::create_dir_all(source.path().join("docs").join("old")).unwrap();
        fs::write(source.path().join("docs").join("readme.md"), "readme").unwrap();
        fs::write(source.path().join("top.txt"), "top").unwrap();

        fs::create_dir_all(replica.path().join("junk").join("deeper")).unwrap();
        fs::write(replica.path().join("junk").join("deeper").join("j.bin"), "junk").unwrap();
        fs::write(replica.path().join("docs"), "a file named like the source dir").unwrap();
        fs::write(replica.path().join("extra.txt"), "extra").unwrap();

        let (engine, _sink) = engine(source.path(), replica.path());
        let report = engine.run_pass().await.unwrap();

        assert_eq!(report.failures, 0);
        assert_eq!(tree(replica.path()), tree(source.path()));
    }

    #[tokio::test]
    async fn test_source_deletion_after_snapshot_waits_for_next_pass() {
        let source = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        fs::write(source.path().join("keep.txt"), "keep").unwrap();
        fs::write(source.path().join("drop.txt"), "drop").unwrap();

        let (engine, _sink) = engine(source.path(), replica.path());
        engine.run_pass().await.unwrap();

        let snapshot = engine.capture().await.unwrap();
        fs::remove_file(source.path().join("drop.txt")).unwrap();
        engine.apply(snapshot).await.unwrap();
        assert!(replica.path().join("drop.txt").exists());

        engine.run_pass().await.unwrap();
        assert!(!replica.path().join("drop.txt").exists());
        assert!(replica.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_directory_replaced_by_file_reports_no_failures() {
        let source = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        fs::write(source.path().join("item"), "now a file").unwrap();
        fs::create_dir(replica.path().join("item")).unwrap();
        fs::write(replica.path().join("item").join("old.txt"), "old").unwrap();

        let (engine, sink) = engine(source.path(), replica.path());
        let report = engine.run_pass().await.unwrap();

        assert_eq!(report.failures, 0);
        assert_eq!(sink.count(|e| matches!(e, SyncEvent::EntryFailed { .. })), 0);
        assert!(replica.path().join("item").is_file());
        assert_eq!(tree(replica.path()), tree(source.path()));
    }

    #[tokio::test]
    async fn test_fast_strategy_keeps_same_size_rename() {
        let source = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        fs::write(source.path().join("new.txt"), "same").unwrap();
        fs::write(replica.path().join("old.txt"), "same").unwrap();

        let sink = Arc::new(RecordingSink::default());
        let config = SyncConfig::new(source.path(), replica.path())
            .with_delete_strategy(DeleteStrategy::Fast);
        let fast = SyncEngine::new(config, sink.clone());
        let report = fast.run_pass().await.unwrap();

        assert_eq!(report.files_copied, 1);
        assert_eq!(report.files_deleted, 0);
        assert!(replica.path().join("old.txt").exists());

        // 默认策略会清理
        let (exact, _sink) = engine(source.path(), replica.path());
        let report = exact.run_pass().await.unwrap();
        assert_eq!(report.files_deleted, 1);
        assert_eq!(tree(replica.path()), tree(source.path()));
    }

    #[tokio::test]
    async fn test_missing_source_fails_pass() {
        let dir = TempDir::new().unwrap();
        let replica = TempDir::new().unwrap();
        let source = dir.path().join("vanished");

        let (engine, _sink) = engine(&source, replica.path());
        let err = engine.run_pass().await.unwrap_err();

        assert!(matches!(err, SyncError::NotFound(p) if p == source));
    }
}
