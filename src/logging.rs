//! 日志模块 - 控制台与文件双输出，文件带大小限制

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志文件路径
    pub file: PathBuf,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    pub level: String,
    /// 最大日志文件大小（MB），0 表示不轮转
    pub max_size_mb: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("mirrorsync.log"),
            level: "info".to_string(),
            max_size_mb: 5,
        }
    }
}

impl LogConfig {
    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// `<时间> - <级别> - <消息>` 格式
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormat;

impl<S, N> FormatEvent<S, N> for PlainFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// 带大小限制的日志写入器
///
/// 超过上限时当前文件被重命名为 `<文件名>.old`，然后重新打开。
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    written: u64,
    writer: BufWriter<File>,
}

impl SizeRotatingWriter {
    pub fn new(file_path: &Path, max_size_mb: u32) -> io::Result<Self> {
        Self::with_max_bytes(file_path, (max_size_mb as u64) * 1024 * 1024)
    }

    pub(crate) fn with_max_bytes(file_path: &Path, max_size: u64) -> io::Result<Self> {
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // 检查现有文件大小，如果超过限制则轮转
        if max_size > 0 {
            if let Ok(metadata) = fs::metadata(file_path) {
                if metadata.len() > max_size {
                    Self::rotate_log(file_path)?;
                }
            }
        }

        let (writer, written) = Self::open_file(file_path)?;
        Ok(Self {
            file_path: file_path.to_path_buf(),
            max_size,
            written,
            writer,
        })
    }

    fn open_file(file_path: &Path) -> io::Result<(BufWriter<File>, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let len = file.metadata()?.len();
        Ok((BufWriter::new(file), len))
    }

    fn backup_path(file_path: &Path) -> PathBuf {
        let mut name = OsString::from(file_path.as_os_str());
        name.push(".old");
        PathBuf::from(name)
    }

    /// 轮转日志文件
    fn rotate_log(file_path: &Path) -> io::Result<()> {
        let backup_path = Self::backup_path(file_path);

        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }

        fs::rename(file_path, &backup_path)
    }

    fn check_and_rotate(&mut self) -> io::Result<()> {
        if self.max_size == 0 || self.written <= self.max_size {
            return Ok(());
        }

        self.writer.flush()?;
        Self::rotate_log(&self.file_path)?;
        let (writer, written) = Self::open_file(&self.file_path)?;
        self.writer = writer;
        self.written = written;
        Ok(())
    }
}

impl Write for SizeRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.writer.flush()?;
        self.written += n as u64;
        self.check_and_rotate()?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// 初始化日志系统：控制台 + 日志文件
///
/// 返回的 guard 必须在进程生命周期内保持存活，否则文件日志会丢失。
pub fn init_logging(config: &LogConfig) -> anyhow::Result<WorkerGuard> {
    let file_writer = SizeRotatingWriter::new(&config.file, config.max_size_mb)?;
    let (file_writer, guard) = NonBlockingBuilder::default()
        .lossy(false)
        .finish(file_writer);

    let env_filter = EnvFilter::from_default_env().add_directive(config.tracing_level().into());

    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(PlainFormat)
        .with_writer(file_writer)
        .with_ansi(false);

    let console_layer = tracing_subscriber::fmt::layer()
        .event_format(PlainFormat)
        .with_writer(io::stdout);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    Ok(guard)
}
