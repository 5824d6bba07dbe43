//! Builder 模式实现
//!
//! 提供链式构造 `Tracker` 实例的便捷方式，并负责串口选择：
//! 按顺序尝试每个候选串口，第一个成功打开、配置并完成握手的被使用。

use crate::config::TrackerConfig;
use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use crate::sink::{Orientation, OrientationSink};
use crate::tracker::Tracker;
use polhemus_protocol::DeviceVariant;
use polhemus_serial::{SerialChannel, SerialError};
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(unix)]
use polhemus_serial::{TtyPort, open_channel};

/// Tracker Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use polhemus_driver::{ChannelSink, TrackerBuilder};
///
/// let (sink, orientations) = ChannelSink::new(64);
/// let tracker = TrackerBuilder::new()
///     .variant_name("fastrak")
///     .ports("/dev/ttyUSB0 /dev/ttyS0")
///     .sink(sink)
///     .build()
///     .unwrap();
///
/// let first = orientations.recv().unwrap();
/// println!("{} on {}: {:.2}", tracker.variant(), tracker.port(), first.azimuth);
/// ```
pub struct TrackerBuilder {
    /// 设备型号（优先于 `variant_name`）
    variant: Option<DeviceVariant>,
    /// 设备型号名称（构建时解析）
    variant_name: Option<String>,
    /// 候选串口，按顺序尝试
    ports: Vec<String>,
    pipeline_config: Option<PipelineConfig>,
    sink: Option<Arc<dyn OrientationSink>>,
}

impl TrackerBuilder {
    pub fn new() -> Self {
        Self {
            variant: None,
            variant_name: None,
            ports: Vec::new(),
            pipeline_config: None,
            sink: None,
        }
    }

    /// 从配置文件内容创建
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new()
            .variant(config.variant)
            .ports(&config.ports)
            .pipeline_config(config.pipeline)
    }

    pub fn variant(mut self, variant: DeviceVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    /// 按名称指定型号（`"fastrak"`、`"polhemus"`、`"patriot"`，不区分大小写）
    pub fn variant_name(mut self, name: impl Into<String>) -> Self {
        self.variant_name = Some(name.into());
        self
    }

    /// 追加以空白分隔的候选串口列表
    pub fn ports(mut self, ports: &str) -> Self {
        self.ports.extend(ports.split_whitespace().map(str::to_string));
        self
    }

    /// 追加单个候选串口
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.ports.push(port.into());
        self
    }

    /// 设置 Pipeline 配置（可选）
    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = Some(config);
        self
    }

    /// 设置朝向输出（可选，默认丢弃）
    pub fn sink(mut self, sink: impl OrientationSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// 打开第一个可用的串口并启动 Tracker
    #[cfg(unix)]
    pub fn build(self) -> Result<Tracker<TtyPort>, DriverError> {
        self.build_with(open_channel)
    }

    /// 使用自定义打开函数构建（测试 / 非 termios 串口）
    ///
    /// `opener` 必须返回已配置并完成握手的串口。
    ///
    /// # 错误
    /// - `DriverError::MissingVariant` / `UnknownVariant`: 型号缺失或无法识别
    /// - `DriverError::NoPorts`: 没有候选串口（不会调用 `opener`）
    /// - `DriverError::Serial`: 只有一个候选串口且失败（保留失败的配置步骤）
    /// - `DriverError::NoUsablePort`: 多个候选串口全部失败，`last` 为最后一个错误
    pub fn build_with<C, F>(self, mut opener: F) -> Result<Tracker<C>, DriverError>
    where
        C: SerialChannel + Send + 'static,
        F: FnMut(&str, DeviceVariant) -> Result<C, SerialError>,
    {
        let variant = self.resolve_variant()?;

        if self.ports.is_empty() {
            return Err(DriverError::NoPorts);
        }

        let config = self.pipeline_config.unwrap_or_default();
        config.validate()?;
        let mut sink = self.sink;
        let mut last_error = None;

        for port in &self.ports {
            match opener(port, variant) {
                Ok(channel) => {
                    info!("Opened {} tracker on '{}'", variant, port);
                    let sink = sink.take().unwrap_or_else(discard_sink);
                    let mut tracker = Tracker::new(channel, variant, sink, config);
                    tracker.start()?;
                    return Ok(tracker);
                },
                Err(e) => {
                    warn!("Could not use '{}' for {} tracker: {}", port, variant, e);
                    last_error = Some(e);
                },
            }
        }

        let attempts = self.ports.len();
        match last_error {
            Some(last) if attempts == 1 => Err(DriverError::Serial(last)),
            Some(last) => Err(DriverError::NoUsablePort { attempts, last }),
            None => Err(DriverError::NoPorts),
        }
    }

    fn resolve_variant(&self) -> Result<DeviceVariant, DriverError> {
        if let Some(variant) = self.variant {
            return Ok(variant);
        }
        match &self.variant_name {
            Some(name) => name
                .parse()
                .map_err(|_| DriverError::UnknownVariant(name.clone())),
            None => Err(DriverError::MissingVariant),
        }
    }
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn discard_sink() -> Arc<dyn OrientationSink> {
    Arc::new(|_: Orientation| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use polhemus_serial::{ConfigStep, MockChannel};
    use std::io;

    fn missing(port: &str) -> SerialError {
        SerialError::setup(port, ConfigStep::Open, io::Error::from(io::ErrorKind::NotFound))
    }

    #[test]
    fn test_builder_collects_ports() {
        let builder = TrackerBuilder::new()
            .ports("  /dev/ttyS0\t/dev/ttyS1 \n")
            .port("/dev/ttyUSB0");
        assert_eq!(builder.ports, vec!["/dev/ttyS0", "/dev/ttyS1", "/dev/ttyUSB0"]);
    }

    #[test]
    fn test_resolve_variant() {
        let builder = TrackerBuilder::new().variant_name("Polhemus");
        assert_eq!(builder.resolve_variant().unwrap(), DeviceVariant::Fastrak);

        // 显式型号优先于名称
        let builder = TrackerBuilder::new()
            .variant_name("fastrak")
            .variant(DeviceVariant::Patriot);
        assert_eq!(builder.resolve_variant().unwrap(), DeviceVariant::Patriot);

        let builder = TrackerBuilder::new().variant_name("isotrak");
        assert!(matches!(
            builder.resolve_variant(),
            Err(DriverError::UnknownVariant(name)) if name == "isotrak"
        ));

        assert!(matches!(
            TrackerBuilder::new().resolve_variant(),
            Err(DriverError::MissingVariant)
        ));
    }

    #[test]
    fn test_empty_port_list_opens_nothing() {
        let mut calls = 0;
        let result = TrackerBuilder::new()
            .variant(DeviceVariant::Fastrak)
            .ports("   ")
            .build_with(|_, _| {
                calls += 1;
                Ok(MockChannel::new().0)
            });

        assert!(matches!(result, Err(DriverError::NoPorts)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_unknown_variant_opens_nothing() {
        let mut calls = 0;
        let result = TrackerBuilder::new()
            .variant_name("isotrak")
            .ports("/dev/ttyS0")
            .build_with(|_, _| {
                calls += 1;
                Ok(MockChannel::new().0)
            });

        assert!(matches!(result, Err(DriverError::UnknownVariant(_))));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_all_ports_fail() {
        let mut tried = Vec::new();
        let result = TrackerBuilder::new()
            .variant(DeviceVariant::Patriot)
            .ports("/dev/a /dev/b")
            .build_with(|port, variant| -> Result<MockChannel, _> {
                assert_eq!(variant, DeviceVariant::Patriot);
                tried.push(port.to_string());
                Err(missing(port))
            });

        match result {
            Err(DriverError::NoUsablePort { attempts: 2, last }) => {
                assert!(last.to_string().contains("/dev/b"), "{}", last);
                assert_eq!(last.step(), Some(ConfigStep::Open));
            },
            other => panic!("Expected NoUsablePort, got {:?}", other.map(|_| ())),
        }
        assert_eq!(tried, vec!["/dev/a", "/dev/b"]);
    }

    #[test]
    fn test_single_port_failure_reports_step() {
        let result = TrackerBuilder::new()
            .variant(DeviceVariant::Fastrak)
            .ports("/dev/ttyS0")
            .build_with(|port, _| -> Result<MockChannel, _> {
                Err(SerialError::setup(
                    port,
                    ConfigStep::SetSpeed,
                    io::Error::from(io::ErrorKind::InvalidInput),
                ))
            });

        match result {
            Err(DriverError::Serial(e)) => assert_eq!(e.step(), Some(ConfigStep::SetSpeed)),
            other => panic!("Expected Serial error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_dropped_orientations_visible_after_build() {
        use crate::sink::ChannelSink;
        use polhemus_protocol::encode_line;
        use std::sync::atomic::Ordering;
        use std::time::{Duration, Instant};

        let (sink, orientations) = ChannelSink::new(1);
        let dropped = sink.dropped_orientations().clone();
        let (channel, device) = MockChannel::named("mock0");
        let mut channel = Some(channel);

        let mut tracker = TrackerBuilder::new()
            .variant(DeviceVariant::Fastrak)
            .port("mock0")
            .sink(sink)
            .build_with(|_, _| channel.take().ok_or_else(|| missing("mock0")))
            .unwrap();

        let line =
            encode_line(DeviceVariant::Fastrak, "01", &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        for _ in 0..4 {
            device.push_bytes(&line);
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while tracker.metrics().orientations_published < 4 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        tracker.stop().unwrap();

        // 没有消费者：第一条进入通道，其余被丢弃
        assert_eq!(dropped.load(Ordering::Relaxed), 3);
        assert_eq!(orientations.len(), 1);
    }

    #[test]
    fn test_first_working_port_wins() {
        let mut tried = Vec::new();
        let mut tracker = TrackerBuilder::new()
            .variant(DeviceVariant::Fastrak)
            .ports("/dev/missing mock1 mock2")
            .build_with(|port, _| {
                tried.push(port.to_string());
                if port.starts_with("/dev/") {
                    Err(missing(port))
                } else {
                    Ok(MockChannel::named(port).0)
                }
            })
            .unwrap();

        assert_eq!(tried, vec!["/dev/missing", "mock1"]);
        assert_eq!(tracker.port(), "mock1");
        assert_eq!(tracker.pipeline_config(), &PipelineConfig::default());
        tracker.stop().unwrap();
    }
}
