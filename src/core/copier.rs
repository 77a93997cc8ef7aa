use crate::core::events::{EventSink, SyncEvent};
use crate::error::{Result, SyncError};
use std::fs::{self, File, FileTimes, Metadata};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// 修改时间容差，差值不超过该值视为未变化
pub const MTIME_TOLERANCE: Duration = Duration::from_secs(1);

/// 复制阶段统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub dirs_created: usize,
    pub files_copied: usize,
    pub files_unchanged: usize,
    pub failures: usize,
}

/// 将源目录树复制到副本
///
/// 逐条目处理：缺失的目录被创建，缺失或过期的文件被复制（保留修改时间和权限）。
/// 单个条目失败只记录事件，不影响同级条目。
pub fn copy_tree(source: &Path, replica: &Path, sink: &dyn EventSink) -> Result<CopyStats> {
    if !source.is_dir() {
        return Err(SyncError::NotFound(source.to_path_buf()));
    }
    if !replica.is_dir() {
        return Err(SyncError::NotFound(replica.to_path_buf()));
    }

    let mut stats = CopyStats::default();
    copy_dir(source, replica, sink, &mut stats)?;
    Ok(stats)
}

fn copy_dir(source: &Path, replica: &Path, sink: &dyn EventSink, stats: &mut CopyStats) -> Result<()> {
    let mut items = Vec::new();
    for entry in fs::read_dir(source).map_err(|e| SyncError::fs("读取目录", source, e))? {
        match entry {
            Ok(entry) => items.push(entry.file_name()),
            Err(e) => {
                stats.failures += 1;
                sink.record(SyncEvent::EntryFailed {
                    error: SyncError::fs("读取目录", source, e),
                });
            }
        }
    }
    items.sort();

    for item in items {
        let s_path = source.join(&item);
        let r_path = replica.join(&item);
        if let Err(error) = copy_entry(&s_path, &r_path, sink, stats) {
            stats.failures += 1;
            sink.record(SyncEvent::EntryFailed { error });
        }
    }

    Ok(())
}

fn copy_entry(s_path: &Path, r_path: &Path, sink: &dyn EventSink, stats: &mut CopyStats) -> Result<()> {
    let s_meta = fs::metadata(s_path).map_err(|e| SyncError::fs("读取元数据", s_path, e))?;

    if s_meta.is_dir() {
        // 不跟随指向目录的符号链接，避免循环
        let is_link = fs::symlink_metadata(s_path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if is_link {
            sink.record(SyncEvent::EntrySkipped {
                path: s_path.to_path_buf(),
                reason: "指向目录的符号链接".to_string(),
            });
            return Ok(());
        }

        let exists = match fs::symlink_metadata(r_path) {
            Ok(r_meta) if r_meta.is_dir() => true,
            Ok(_) => {
                // 副本中同名的是文件或符号链接，先移除
                fs::remove_file(r_path).map_err(|e| SyncError::fs("删除文件", r_path, e))?;
                false
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(SyncError::fs("读取元数据", r_path, e)),
        };

        if !exists {
            fs::create_dir_all(r_path).map_err(|e| SyncError::fs("创建目录", r_path, e))?;
            stats.dirs_created += 1;
            sink.record(SyncEvent::DirectoryCreated {
                path: r_path.to_path_buf(),
            });
        }

        return copy_dir(s_path, r_path, sink, stats);
    }

    let needs_copy = match fs::symlink_metadata(r_path) {
        Ok(r_meta) if r_meta.is_dir() => {
            // 副本中同名的是目录，整个移除后再复制
            fs::remove_dir_all(r_path).map_err(|e| SyncError::fs("删除目录", r_path, e))?;
            true
        }
        Ok(r_meta) if r_meta.file_type().is_symlink() => {
            fs::remove_file(r_path).map_err(|e| SyncError::fs("删除文件", r_path, e))?;
            true
        }
        Ok(r_meta) => is_stale(s_path, &s_meta, r_path, &r_meta)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => return Err(SyncError::fs("读取元数据", r_path, e)),
    };

    if !needs_copy {
        stats.files_unchanged += 1;
        return Ok(());
    }

    copy_file(s_path, r_path, &s_meta)?;
    stats.files_copied += 1;
    sink.record(SyncEvent::FileCopied {
        from: s_path.to_path_buf(),
        to: r_path.to_path_buf(),
    });
    Ok(())
}

/// 源文件比副本新超过容差时需要复制
fn is_stale(s_path: &Path, source: &Metadata, r_path: &Path, replica: &Metadata) -> Result<bool> {
    let source_mtime = source
        .modified()
        .map_err(|e| SyncError::fs("读取修改时间", s_path, e))?;
    let replica_mtime = replica
        .modified()
        .map_err(|e| SyncError::fs("读取修改时间", r_path, e))?;
    Ok(newer_than(source_mtime, replica_mtime))
}

pub(crate) fn newer_than(source: SystemTime, replica: SystemTime) -> bool {
    source
        .duration_since(replica)
        .map(|diff| diff > MTIME_TOLERANCE)
        .unwrap_or(false)
}

/// 复制内容和权限，再写回源文件的访问/修改时间
fn copy_file(s_path: &Path, r_path: &Path, s_meta: &Metadata) -> Result<()> {
    fs::copy(s_path, r_path).map_err(|e| SyncError::fs("复制文件", r_path, e))?;

    let mut times = FileTimes::new();
    if let Ok(modified) = s_meta.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = s_meta.accessed() {
        times = times.set_accessed(accessed);
    }

    open_for_times(r_path)
        .and_then(|file| file.set_times(times))
        .map_err(|e| SyncError::fs("设置修改时间", r_path, e))
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    fs::OpenOptions::new()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .open(path)
}

// 只读副本也能通过只读句柄设置时间
#[cfg(not(windows))]
fn open_for_times(path: &Path) -> io::Result<File> {
    File::open(path)
}
