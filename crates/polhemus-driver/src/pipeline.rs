//! 采集循环
//!
//! 每次迭代：读取一行 → 解码 → 更新当前读数 → （需要时）标定 → 发布。
//!
//! - 长度不符或字段无效的行：当前读数的方位角置 0，本次发布 `0.0`
//! - 读错误：记录并继续；自上一完整行以来累计 `fault_threshold` 次后进入
//!   `Disconnected` 终止状态并退出（0 表示永不升级）
//! - 空闲超时：单独计数，只有设置了 `idle_threshold` 才会升级为断开
//! - 停止请求在每次有界等待之前检查，半行也会被放弃

use crate::calibration::Calibration;
use crate::error::DriverError;
use crate::metrics::TrackerMetrics;
use crate::sink::{Orientation, OrientationSink};
use crate::state::{AtomicWorkerState, WorkerState};
use arc_swap::ArcSwap;
use crossbeam_channel::{Sender, TrySendError};
use polhemus_protocol::{DeviceVariant, Sample, SampleDecoder};
use polhemus_serial::{FrameFault, LineReader, RawLine, ReadEvent, SerialChannel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Pipeline 配置参数
///
/// 可以出现在配置文件的 `[pipeline]` 表中，缺省字段取默认值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 单次等待数据的超时（毫秒）
    pub poll_timeout_ms: u64,
    /// 连续读错误达到此次数后判定断开（0 = 不判定）
    pub fault_threshold: u32,
    /// 连续空闲超时达到此次数后判定断开（0 = 不判定）
    pub idle_threshold: u32,
    /// 事件通道容量
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 100,
            fault_threshold: 50,
            idle_threshold: 0,
            event_capacity: 64,
        }
    }
}

impl PipelineConfig {
    /// poll 超时上限（poll(2) 的毫秒参数在 nix 中为 u16）
    pub const MAX_POLL_TIMEOUT_MS: u64 = u16::MAX as u64;

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// 检查参数范围
    ///
    /// # 错误
    /// - `poll_timeout_ms` 为 0 或超过 [`Self::MAX_POLL_TIMEOUT_MS`]
    /// - `event_capacity` 为 0
    pub fn validate(&self) -> Result<(), DriverError> {
        if !(1..=Self::MAX_POLL_TIMEOUT_MS).contains(&self.poll_timeout_ms) {
            return Err(DriverError::Config(format!(
                "poll_timeout_ms must be between 1 and {} (got {})",
                Self::MAX_POLL_TIMEOUT_MS,
                self.poll_timeout_ms
            )));
        }
        if self.event_capacity == 0 {
            return Err(DriverError::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

/// 采集线程上报给宿主的事件
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// 捕获了新的标定偏移量
    Calibrated { offset: f32 },
    /// 读故障（非致命，循环继续）
    Fault(String),
    /// 连续读错误（或空闲超时）达到阈值，采集线程已退出
    Disconnected { consecutive_faults: u32 },
}

/// 采集线程与宿主之间的共享状态
///
/// 采集线程是唯一的写入者；宿主只读取快照。
#[derive(Debug)]
pub struct TrackerContext {
    /// 最近一次读数（方位角在拒绝行时置 0）
    pub latest_sample: ArcSwap<Sample>,
    /// 当前标定状态
    pub calibration: ArcSwap<Calibration>,
    pub metrics: TrackerMetrics,
    pub state: AtomicWorkerState,
    recalibrate: AtomicBool,
    events: Sender<TrackerEvent>,
}

impl TrackerContext {
    pub fn new(events: Sender<TrackerEvent>) -> Self {
        Self {
            latest_sample: ArcSwap::from_pointee(Sample::default()),
            calibration: ArcSwap::from_pointee(Calibration::new()),
            metrics: TrackerMetrics::new(),
            state: AtomicWorkerState::default(),
            recalibrate: AtomicBool::new(false),
            events,
        }
    }

    /// 请求在下一个成功解码的样本上重新标定
    pub fn request_recalibration(&self) {
        self.recalibrate.store(true, Ordering::Release);
    }

    fn take_recalibration(&self) -> bool {
        self.recalibrate.swap(false, Ordering::AcqRel)
    }

    /// 非阻塞发送事件；通道满时计数丢弃
    fn emit(&self, event: TrackerEvent) {
        match self.events.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                self.metrics.events_dropped.fetch_add(1, Ordering::Relaxed);
            },
            Err(TrySendError::Disconnected(_)) => {},
        }
    }
}

/// 采集主循环
///
/// 在采集线程中运行，直到 `running` 被清除或判定断开；返回串口以便再次启动。
///
/// # 参数
/// - `channel`: 已配置并完成握手的串口（线程独占）
/// - `variant`: 设备型号（决定行宽）
/// - `sink`: 朝向输出
/// - `ctx`: 共享状态
/// - `config`: Pipeline 配置
/// - `running`: 运行标志（宿主清除 → 循环退出）
pub fn acquisition_loop<C: SerialChannel>(
    mut channel: C,
    variant: DeviceVariant,
    sink: Arc<dyn OrientationSink>,
    ctx: Arc<TrackerContext>,
    config: PipelineConfig,
    running: Arc<AtomicBool>,
) -> C {
    channel.set_read_timeout(config.poll_timeout());

    let decoder = SampleDecoder::new(variant);
    let reader = LineReader::new();
    let mut line = RawLine::new();
    let mut current = Sample::clone(&ctx.latest_sample.load());
    let mut calibration = Calibration::new();
    let mut consecutive_faults: u32 = 0;
    let mut idle_polls: u32 = 0;

    // 每次启动都重新标定
    ctx.calibration.store(Arc::new(calibration));
    ctx.take_recalibration();

    // stop() 可能已经抢先把状态改成 Stopping，不能覆盖
    ctx.state.compare_exchange(
        WorkerState::Starting,
        WorkerState::Running,
        Ordering::AcqRel,
        Ordering::Acquire,
    );
    info!(
        "Acquisition loop started on '{}' ({}, {}-byte lines)",
        channel.name(),
        variant,
        variant.line_len()
    );

    'acquire: loop {
        line.clear();

        loop {
            match reader.read_line(&mut channel, &mut line, &running) {
                ReadEvent::Line => break,
                ReadEvent::Cancelled => break 'acquire,
                ReadEvent::Fault(fault) => {
                    ctx.metrics.frame_faults.fetch_add(1, Ordering::Relaxed);
                    let (count, threshold) = match fault {
                        FrameFault::Timeout => {
                            idle_polls = idle_polls.saturating_add(1);
                            (idle_polls, config.idle_threshold)
                        },
                        FrameFault::Read(_) => {
                            consecutive_faults = consecutive_faults.saturating_add(1);
                            (consecutive_faults, config.fault_threshold)
                        },
                    };
                    report_fault(&ctx, &fault, count, channel.name());

                    if threshold > 0 && count >= threshold {
                        error!(
                            "Tracker on '{}' disconnected after {} consecutive faults ({})",
                            channel.name(),
                            count,
                            fault
                        );
                        ctx.state.set(WorkerState::Disconnected, Ordering::Release);
                        ctx.emit(TrackerEvent::Disconnected {
                            consecutive_faults: count,
                        });
                        break 'acquire;
                    }
                },
            }
        }

        consecutive_faults = 0;
        idle_polls = 0;

        if ctx.take_recalibration() {
            calibration.arm();
        }

        let azimuth = match decoder.decode(&line) {
            Ok(Some(sample)) => {
                ctx.metrics.lines_decoded.fetch_add(1, Ordering::Relaxed);

                if calibration.is_armed() {
                    calibration.capture(sample.azimuth);
                    ctx.calibration.store(Arc::new(calibration));
                    ctx.metrics.calibrations.fetch_add(1, Ordering::Relaxed);
                    info!(
                        "Calibrated azimuth offset {:.2} (sensor '{}')",
                        sample.azimuth, sample.header
                    );
                    ctx.emit(TrackerEvent::Calibrated {
                        offset: sample.azimuth,
                    });
                }

                let azimuth = calibration.apply(sample.azimuth);
                current = sample;
                azimuth
            },
            rejected => {
                match rejected {
                    Ok(_) => debug!(
                        "Skipping {}-byte line (expected {})",
                        line.len(),
                        variant.line_len()
                    ),
                    Err(e) => debug!("Skipping malformed line: {}", e),
                }
                ctx.metrics.lines_rejected.fetch_add(1, Ordering::Relaxed);
                current.azimuth = 0.0;
                0.0
            },
        };

        ctx.latest_sample.store(Arc::new(current.clone()));
        sink.publish(Orientation::new(azimuth));
        ctx.metrics.orientations_published.fetch_add(1, Ordering::Relaxed);
    }

    info!("Acquisition loop on '{}' exited", channel.name());
    channel
}

fn report_fault(ctx: &TrackerContext, fault: &FrameFault, consecutive: u32, port: &str) {
    match fault {
        // 空闲超时只在一串超时的开头上报
        FrameFault::Timeout => {
            if consecutive == 1 {
                warn!("No data from tracker on '{}' within poll timeout", port);
                ctx.emit(TrackerEvent::Fault(fault.to_string()));
            } else {
                trace!("Still no data on '{}' ({} idle polls)", port, consecutive);
            }
        },
        FrameFault::Read(_) => {
            warn!("Can not read from serial port '{}': {}", port, fault);
            ctx.emit(TrackerEvent::Fault(fault.to_string()));
        },
    }
}
