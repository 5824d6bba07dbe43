//! 采集线程状态
//!
//! ```text
//! Stopped → Starting → Running → Stopping → Stopped
//!                         │
//!                         └── 连续故障达到阈值 → Disconnected ──(stop)──→ Stopped
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 采集线程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WorkerState {
    /// 没有采集线程（默认）
    #[default]
    Stopped = 0,
    /// 线程已创建，尚未进入循环
    Starting = 1,
    /// 正在读取、解码、发布
    Running = 2,
    /// 已请求停止，等待线程结束
    Stopping = 3,
    /// 连续故障过多，线程已自行退出（终止状态，需 stop 后再 start）
    Disconnected = 4,
}

impl WorkerState {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Stopped。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            4 => Self::Disconnected,
            _ => Self::Stopped,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Disconnected => "disconnected",
        };
        f.write_str(text)
    }
}

/// 采集线程状态（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicWorkerState {
    inner: AtomicU8,
}

impl AtomicWorkerState {
    pub fn new(state: WorkerState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> WorkerState {
        WorkerState::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, state: WorkerState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }

    /// 比较并交换
    ///
    /// 当前值等于 `current` 时设置为 `new` 并返回 true。
    pub fn compare_exchange(
        &self,
        current: WorkerState,
        new: WorkerState,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }
}

impl Default for AtomicWorkerState {
    fn default() -> Self {
        Self::new(WorkerState::Stopped)
    }
}
