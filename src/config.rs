//! 应用配置模块

use crate::error::{Result, SyncError};
use crate::logging::LogConfig;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 孤儿条目删除策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DeleteStrategy {
    /// 每轮都完整比对副本清单
    #[default]
    Exact,
    /// 副本条目数不多于源时跳过删除（同名数量相同但内容不同时会漏删）
    Fast,
}

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "mirrorsync", version, about = "单向定时目录镜像")]
pub struct Cli {
    /// 源目录
    #[arg(long)]
    pub source: PathBuf,

    /// 副本目录（必须已存在）
    #[arg(long)]
    pub replica: PathBuf,

    /// 同步间隔（秒）
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// 日志文件路径
    #[arg(long)]
    pub log: PathBuf,

    /// 删除策略
    #[arg(long, value_enum, default_value_t = DeleteStrategy::Exact)]
    pub delete_strategy: DeleteStrategy,

    /// 日志级别: error, warn, info, debug, trace
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// 日志文件最大大小（MB），0 表示不轮转
    #[arg(long, default_value_t = 5)]
    pub log_max_size_mb: u32,
}

impl Cli {
    /// 拆分为同步配置和日志配置，并在启动前校验
    pub fn into_configs(self) -> Result<(SyncConfig, LogConfig)> {
        if self.log.as_os_str().is_empty() {
            return Err(SyncError::Configuration("日志文件路径不能为空".into()));
        }

        let sync = SyncConfig {
            source: self.source,
            replica: self.replica,
            interval: Duration::from_secs(self.interval),
            delete_strategy: self.delete_strategy,
        };
        sync.validate()?;

        let log = LogConfig {
            file: self.log,
            level: self.log_level,
            max_size_mb: self.log_max_size_mb,
        };

        Ok((sync, log))
    }
}

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    /// 两轮同步之间的等待时间
    pub interval: Duration,
    pub delete_strategy: DeleteStrategy,
}

impl SyncConfig {
    pub fn new(source: impl Into<PathBuf>, replica: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
            interval: Duration::from_secs(60),
            delete_strategy: DeleteStrategy::default(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_delete_strategy(mut self, strategy: DeleteStrategy) -> Self {
        self.delete_strategy = strategy;
        self
    }

    /// 校验源目录、副本目录和间隔。副本根目录不会被自动创建。
    pub fn validate(&self) -> Result<()> {
        check_dir("源目录", &self.source)?;
        check_dir("副本目录", &self.replica)?;
        if self.interval.is_zero() {
            return Err(SyncError::Configuration("同步间隔必须大于 0".into()));
        }
        Ok(())
    }
}

fn check_dir(label: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(SyncError::Configuration(format!("{}不能为空", label)));
    }
    if !path.is_dir() {
        return Err(SyncError::Configuration(format!(
            "{}不存在或不是目录: {}",
            label,
            path.display()
        )));
    }
    Ok(())
}
