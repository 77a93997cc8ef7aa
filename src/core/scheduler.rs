//! 定时调度：启动后立即同步一次，之后按固定间隔重复，直到被取消

use crate::core::engine::SyncEngine;
use crate::core::events::SyncEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RunningPass,
    Waiting,
    /// 终止状态，只能通过取消令牌到达
    Stopped,
}

/// 同步调度器
pub struct Scheduler {
    engine: SyncEngine,
    state: watch::Sender<SchedulerState>,
    passes: AtomicU64,
}

impl Scheduler {
    pub fn new(engine: SyncEngine) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            engine,
            state,
            passes: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// 已结束的同步轮数（包括失败的）
    pub fn passes_completed(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }

    /// 运行调度循环
    ///
    /// 正在执行的一轮不会被打断；取消在等待期间或下一轮开始前生效。
    /// 单轮失败只记录日志，循环继续。
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = self.engine.config().interval;
        info!(
            "开始同步: {} -> {}, 间隔 {}s",
            self.engine.config().source.display(),
            self.engine.config().replica.display(),
            interval.as_secs_f64()
        );

        while !cancel.is_cancelled() {
            self.set_state(SchedulerState::RunningPass);
            match self.engine.run_pass().await {
                Ok(report) => debug!("第 {} 轮同步结束, {} 处修改", self.passes_completed() + 1, report.changes()),
                Err(error) => self.engine.sink().record(SyncEvent::PassFailed { error }),
            }
            self.passes.fetch_add(1, Ordering::SeqCst);

            self.set_state(SchedulerState::Waiting);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.set_state(SchedulerState::Stopped);
        info!("同步已停止，共执行 {} 轮", self.passes_completed());
    }
}
