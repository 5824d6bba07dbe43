//! Tracker API 模块
//!
//! 提供对外的 `Tracker` 结构体，封装采集线程和状态同步细节。
//!
//! 串口随采集线程移动：`start()` 把串口交给线程，`stop()` 通过
//! `JoinHandle` 把它取回，因此可以反复 start / stop，且串口只在
//! `Tracker` 被 Drop 时关闭一次。

use crate::error::DriverError;
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{PipelineConfig, TrackerContext, TrackerEvent, acquisition_loop};
use crate::sink::OrientationSink;
use crate::state::WorkerState;
use crossbeam_channel::{Receiver, bounded};
use polhemus_protocol::{DeviceVariant, Sample};
use polhemus_serial::SerialChannel;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Polhemus 追踪器驱动（对外 API）
///
/// 由 [`TrackerBuilder`](crate::TrackerBuilder) 创建时已经处于运行状态。
pub struct Tracker<C: SerialChannel + Send + 'static> {
    variant: DeviceVariant,
    port: String,
    /// 停止时持有串口；运行时为 None（串口在采集线程中）
    channel: Option<C>,
    /// 采集线程句柄，返回值是串口
    worker: Option<JoinHandle<C>>,
    /// 运行标志，与采集线程共享
    is_running: Arc<AtomicBool>,
    ctx: Arc<TrackerContext>,
    sink: Arc<dyn OrientationSink>,
    config: PipelineConfig,
    events: Receiver<TrackerEvent>,
}

impl<C: SerialChannel + Send + 'static> Tracker<C> {
    /// 用已配置好的串口创建（未启动）
    pub fn new(
        channel: C,
        variant: DeviceVariant,
        sink: Arc<dyn OrientationSink>,
        config: PipelineConfig,
    ) -> Self {
        let (events_tx, events) = bounded(config.event_capacity.max(1));
        Self {
            variant,
            port: channel.name().to_string(),
            channel: Some(channel),
            worker: None,
            is_running: Arc::new(AtomicBool::new(false)),
            ctx: Arc::new(TrackerContext::new(events_tx)),
            sink,
            config,
            events,
        }
    }

    /// 启动采集线程
    ///
    /// 每次启动都会在第一个成功解码的样本上重新标定。
    ///
    /// # 错误
    /// - `DriverError::AlreadyRunning`: 线程已存在（包括已 Disconnected 但尚未 stop）
    /// - `DriverError::WorkerPanicked`: 之前的线程 panic，串口已丢失
    /// - `DriverError::ThreadSpawn`: 无法创建线程
    /// - `DriverError::Config`: Pipeline 参数超出范围
    pub fn start(&mut self) -> Result<(), DriverError> {
        if self.worker.is_some() {
            return Err(DriverError::AlreadyRunning);
        }
        self.config.validate()?;
        let channel = self.channel.take().ok_or(DriverError::WorkerPanicked)?;

        self.ctx.state.set(WorkerState::Starting, Ordering::Release);
        // Release: 与 LineReader 中的 Acquire 配对
        self.is_running.store(true, Ordering::Release);

        let variant = self.variant;
        let sink = self.sink.clone();
        let ctx = self.ctx.clone();
        let config = self.config;
        let running = self.is_running.clone();

        let spawned = thread::Builder::new()
            .name(format!("polhemus-{}", variant))
            .spawn(move || acquisition_loop(channel, variant, sink, ctx, config, running));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                info!("Starting {} tracker on '{}'", self.variant, self.port);
                Ok(())
            },
            Err(e) => {
                self.is_running.store(false, Ordering::Release);
                self.ctx.state.set(WorkerState::Stopped, Ordering::Release);
                error!("Failed to spawn acquisition thread: {}", e);
                Err(DriverError::ThreadSpawn(e))
            },
        }
    }

    /// 停止采集线程并等待其结束
    ///
    /// 返回时线程已经完全退出，状态为 `Stopped`。
    /// 停止请求在每次有界等待前检查，延迟不超过一个 poll 周期。
    pub fn stop(&mut self) -> Result<(), DriverError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        self.ctx.state.compare_exchange(
            WorkerState::Running,
            WorkerState::Stopping,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.ctx.state.compare_exchange(
            WorkerState::Starting,
            WorkerState::Stopping,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.is_running.store(false, Ordering::Release);

        let result = handle.join();
        self.ctx.state.set(WorkerState::Stopped, Ordering::Release);

        match result {
            Ok(channel) => {
                self.channel = Some(channel);
                info!("Stopped {} tracker on '{}'", self.variant, self.port);
                Ok(())
            },
            Err(_) => {
                error!("Acquisition thread on '{}' panicked", self.port);
                Err(DriverError::WorkerPanicked)
            },
        }
    }

    /// 在下一个成功解码的样本上重新标定
    pub fn recalibrate(&self) {
        self.ctx.request_recalibration();
    }

    pub fn state(&self) -> WorkerState {
        self.ctx.state.get(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// 最近一次读数（拒绝行之后方位角为 0）
    pub fn latest_sample(&self) -> Sample {
        Sample::clone(&self.ctx.latest_sample.load())
    }

    /// 当前标定偏移量（尚未捕获时为 None）
    pub fn calibration_offset(&self) -> Option<f32> {
        self.ctx.calibration.load().offset()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 事件接收端（可 clone；多个接收端之间竞争消费）
    pub fn events(&self) -> Receiver<TrackerEvent> {
        self.events.clone()
    }

    pub fn variant(&self) -> DeviceVariant {
        self.variant
    }

    /// 使用中的串口名称
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl<C: SerialChannel + Send + 'static> std::fmt::Debug for Tracker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("variant", &self.variant)
            .field("port", &self.port)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

impl<C: SerialChannel + Send + 'static> Drop for Tracker<C> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Failed to stop tracker on '{}': {}", self.port, e);
        }
    }
}
