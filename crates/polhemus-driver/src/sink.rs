//! 输出接口
//!
//! 采集线程每处理一行就调用一次 [`OrientationSink::publish`]。
//! 该调用发生在采集线程上，实现必须快速返回，不能无限阻塞；
//! 需要跨线程消费时使用 [`ChannelSink`]（`try_send`，满则丢弃）。

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 发布给上层的朝向（仅方位角，单位：度）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub azimuth: f32,
}

impl Orientation {
    pub const fn new(azimuth: f32) -> Self {
        Self { azimuth }
    }
}

/// 朝向输出 Trait
///
/// # 示例
///
/// ```rust
/// use polhemus_driver::{Orientation, OrientationSink};
///
/// // 闭包直接实现 OrientationSink
/// let sink = |o: Orientation| println!("azimuth = {:.2}", o.azimuth);
/// sink.publish(Orientation::new(12.5));
/// ```
pub trait OrientationSink: Send + Sync {
    fn publish(&self, orientation: Orientation);
}

impl<F> OrientationSink for F
where
    F: Fn(Orientation) + Send + Sync,
{
    fn publish(&self, orientation: Orientation) {
        self(orientation)
    }
}

/// 转发到有界通道的输出
///
/// 通道满时丢弃本次数据并计数，不会阻塞采集线程。
///
/// Sink 交给 [`TrackerBuilder`](crate::TrackerBuilder) 之后就无法再访问，
/// 需要丢弃计数时先克隆 [`dropped_orientations`](Self::dropped_orientations)：
///
/// ```
/// use polhemus_driver::{ChannelSink, TrackerBuilder};
/// use std::sync::atomic::Ordering;
///
/// let (sink, _orientations) = ChannelSink::new(64);
/// let dropped = sink.dropped_orientations().clone();
/// let _builder = TrackerBuilder::new().sink(sink);
/// assert_eq!(dropped.load(Ordering::Relaxed), 0);
/// ```
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<Orientation>,
    dropped_orientations: Arc<AtomicU64>,
}

impl ChannelSink {
    /// 创建输出及其接收端
    pub fn new(capacity: usize) -> (Self, Receiver<Orientation>) {
        let (tx, rx) = bounded(capacity);
        let sink = Self {
            tx,
            dropped_orientations: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }

    /// 丢弃计数器（可克隆后在 Sink 移交之后继续读取）
    pub fn dropped_orientations(&self) -> &Arc<AtomicU64> {
        &self.dropped_orientations
    }

    /// 因通道已满被丢弃的数量
    pub fn dropped(&self) -> u64 {
        self.dropped_orientations.load(Ordering::Relaxed)
    }
}

impl OrientationSink for ChannelSink {
    fn publish(&self, orientation: Orientation) {
        match self.tx.try_send(orientation) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                self.dropped_orientations.fetch_add(1, Ordering::Relaxed);
            },
            // 接收端已关闭：没有消费者，静默丢弃
            Err(TrySendError::Disconnected(_)) => {},
        }
    }
}
