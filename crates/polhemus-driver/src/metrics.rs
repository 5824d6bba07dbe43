//! 采集指标
//!
//! 原子计数器，由采集线程更新，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 采集链路实时指标
///
/// # 使用示例
///
/// ```rust
/// use polhemus_driver::TrackerMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = TrackerMetrics::default();
/// metrics.lines_decoded.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.lines_decoded, 1);
/// ```
#[derive(Debug, Default)]
pub struct TrackerMetrics {
    /// 成功解码的行数
    pub lines_decoded: AtomicU64,

    /// 被拒绝的行数（长度不符或字段无效）
    ///
    /// 多个传感器交错输出时这个值会持续增长。
    pub lines_rejected: AtomicU64,

    /// 读故障次数（超时 + 读错误）
    pub frame_faults: AtomicU64,

    /// 发布到输出接口的次数
    pub orientations_published: AtomicU64,

    /// 捕获标定偏移量的次数
    pub calibrations: AtomicU64,

    /// 事件通道已满而丢弃的事件数
    pub events_dropped: AtomicU64,
}

impl TrackerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照（各计数器之间可能有微小的时间差）
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_decoded: self.lines_decoded.load(Ordering::Relaxed),
            lines_rejected: self.lines_rejected.load(Ordering::Relaxed),
            frame_faults: self.frame_faults.load(Ordering::Relaxed),
            orientations_published: self.orientations_published.load(Ordering::Relaxed),
            calibrations: self.calibrations.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.lines_decoded.store(0, Ordering::Relaxed);
        self.lines_rejected.store(0, Ordering::Relaxed);
        self.frame_faults.store(0, Ordering::Relaxed);
        self.orientations_published.store(0, Ordering::Relaxed);
        self.calibrations.store(0, Ordering::Relaxed);
        self.events_dropped.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub lines_decoded: u64,
    pub lines_rejected: u64,
    pub frame_faults: u64,
    pub orientations_published: u64,
    pub calibrations: u64,
    pub events_dropped: u64,
}

impl MetricsSnapshot {
    /// 完整读取的行数
    pub fn lines_total(&self) -> u64 {
        self.lines_decoded + self.lines_rejected
    }

    /// 被拒绝行的比例（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。没有读到任何行时返回 0.0。
    pub fn reject_rate(&self) -> f64 {
        let total = self.lines_total();
        if total == 0 {
            return 0.0;
        }
        (self.lines_rejected as f64 / total as f64) * 100.0
    }
}
