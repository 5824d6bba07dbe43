//! # Polhemus Driver
//!
//! Polhemus Fastrak / Patriot 追踪器的采集驱动，包括：
//! - 串口选择（按顺序尝试候选串口）
//! - 采集线程管理（start / stop / Drop）
//! - 标定（启动后第一个样本为零点）
//! - 输出接口（闭包或通道）与事件通知
//! - 状态快照（ArcSwap 无锁读取）与指标
//!
//! # 示例
//!
//! ```no_run
//! use polhemus_driver::{Orientation, TrackerBuilder};
//!
//! let mut tracker = TrackerBuilder::new()
//!     .variant_name("patriot")
//!     .ports("/dev/ttyUSB0")
//!     .sink(|o: Orientation| println!("{:.2}", o.azimuth))
//!     .build()?;
//!
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! tracker.recalibrate();
//! tracker.stop()?;
//! # Ok::<(), polhemus_driver::DriverError>(())
//! ```

mod builder;
pub mod calibration;
pub mod config;
mod error;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod state;
mod tracker;

pub use builder::TrackerBuilder;
pub use calibration::Calibration;
pub use config::TrackerConfig;
pub use error::DriverError;
pub use metrics::{MetricsSnapshot, TrackerMetrics};
pub use pipeline::{PipelineConfig, TrackerContext, TrackerEvent, acquisition_loop};
pub use sink::{ChannelSink, Orientation, OrientationSink};
pub use state::{AtomicWorkerState, WorkerState};
pub use tracker::Tracker;
