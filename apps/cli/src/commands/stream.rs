//! 实时输出命令
//!
//! 打开追踪器，逐条打印标定后的方位角，Ctrl-C 或达到时长后停止。

use anyhow::{Context, Result, bail};
use clap::Args;
use polhemus_driver::{ChannelSink, TrackerBuilder, TrackerConfig, TrackerEvent, WorkerState};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 输出通道容量
const ORIENTATION_CAPACITY: usize = 256;

/// 实时输出命令参数
#[derive(Args, Debug)]
pub struct StreamCommand {
    /// 设备型号（fastrak / polhemus / patriot），覆盖配置文件
    #[arg(short, long)]
    pub variant: Option<String>,

    /// 候选串口，空格分隔，按顺序尝试（覆盖配置文件）
    #[arg(short, long)]
    pub ports: Option<String>,

    /// 配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 运行时长（秒），0 表示直到 Ctrl-C
    #[arg(short, long, default_value_t = 0)]
    pub duration: u64,
}

impl StreamCommand {
    pub fn execute(&self) -> Result<()> {
        let builder = self.builder()?;

        let (sink, orientations) = ChannelSink::new(ORIENTATION_CAPACITY);
        let dropped_orientations = sink.dropped_orientations().clone();
        let mut tracker = builder.sink(sink).build().context("Failed to open tracker")?;
        let events = tracker.events();

        info!(
            "Streaming {} tracker on '{}' (Ctrl-C to stop)",
            tracker.variant(),
            tracker.port()
        );

        let interrupted = Arc::new(AtomicBool::new(false));
        let interrupted_clone = interrupted.clone();
        ctrlc::set_handler(move || {
            interrupted_clone.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl-C handler")?;

        let start = Instant::now();
        let limit = (self.duration > 0).then(|| Duration::from_secs(self.duration));
        let mut disconnected = false;

        while !interrupted.load(Ordering::SeqCst) {
            if let Some(limit) = limit
                && start.elapsed() >= limit
            {
                break;
            }

            if let Ok(orientation) = orientations.recv_timeout(Duration::from_millis(100)) {
                println!("{:>9.2}", orientation.azimuth);
            }

            for event in events.try_iter() {
                match event {
                    TrackerEvent::Calibrated { offset } => {
                        info!("Zero azimuth set at {:.2}", offset);
                    },
                    TrackerEvent::Fault(reason) => warn!("Tracker fault: {}", reason),
                    TrackerEvent::Disconnected { consecutive_faults } => {
                        warn!(
                            "Tracker disconnected after {} consecutive faults",
                            consecutive_faults
                        );
                        disconnected = true;
                    },
                }
            }
            // 事件通道满时 Disconnected 事件可能被丢弃，以状态为准
            if disconnected || tracker.state() == WorkerState::Disconnected {
                disconnected = true;
                break;
            }
        }

        tracker.stop()?;

        let metrics = tracker.metrics();
        info!(
            "Decoded {} lines, rejected {} ({:.1}%), {} read faults, {} orientations dropped",
            metrics.lines_decoded,
            metrics.lines_rejected,
            metrics.reject_rate(),
            metrics.frame_faults,
            dropped_orientations.load(Ordering::Relaxed)
        );

        if disconnected {
            bail!("Tracker on '{}' disconnected", tracker.port());
        }
        Ok(())
    }

    /// 合并配置文件与命令行参数（命令行优先）
    fn builder(&self) -> Result<TrackerBuilder> {
        let config = match &self.config {
            Some(path) => Some(
                TrackerConfig::load(path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
            ),
            None => None,
        };

        let mut builder = TrackerBuilder::new();
        if let Some(config) = &config {
            builder = builder.pipeline_config(config.pipeline);
        }

        builder = match (&self.variant, &config) {
            (Some(name), _) => builder.variant_name(name.as_str()),
            (None, Some(config)) => builder.variant(config.variant),
            (None, None) => bail!("No tracker type given (use --variant or --config)"),
        };

        let ports = match (&self.ports, &config) {
            (Some(ports), _) => ports.as_str(),
            (None, Some(config)) => config.ports.as_str(),
            (None, None) => "",
        };
        Ok(builder.ports(ports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polhemus_driver::DriverError;
    use polhemus_protocol::DeviceVariant;
    use polhemus_serial::{ConfigStep, MockChannel, SerialError};
    use std::io::{self, Write};

    fn command(variant: Option<&str>, ports: Option<&str>, config: Option<PathBuf>) -> StreamCommand {
        StreamCommand {
            variant: variant.map(str::to_string),
            ports: ports.map(str::to_string),
            config,
            duration: 0,
        }
    }

    /// 让每个串口都打开失败，记录尝试顺序与型号
    fn tried_ports(builder: TrackerBuilder) -> (Vec<String>, Option<DeviceVariant>) {
        let mut tried = Vec::new();
        let mut seen_variant = None;
        let result = builder.build_with(|port, variant| -> Result<MockChannel, SerialError> {
            tried.push(port.to_string());
            seen_variant = Some(variant);
            Err(SerialError::setup(
                port,
                ConfigStep::Open,
                io::Error::from(io::ErrorKind::NotFound),
            ))
        });
        assert!(matches!(
            result,
            Err(DriverError::NoUsablePort { .. } | DriverError::Serial(_))
        ));
        (tried, seen_variant)
    }

    #[test]
    fn test_requires_variant() {
        assert!(command(None, Some("/dev/ttyS0"), None).builder().is_err());
    }

    #[test]
    fn test_command_line_overrides_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "variant = \"patriot\"\nports = \"/dev/cfg0 /dev/cfg1\"").unwrap();
        let path = file.path().to_path_buf();

        let builder = command(None, None, Some(path.clone())).builder().unwrap();
        let (tried, variant) = tried_ports(builder);
        assert_eq!(tried, vec!["/dev/cfg0", "/dev/cfg1"]);
        assert_eq!(variant, Some(DeviceVariant::Patriot));

        let builder = command(Some("fastrak"), Some("/dev/cli0"), Some(path)).builder().unwrap();
        let (tried, variant) = tried_ports(builder);
        assert_eq!(tried, vec!["/dev/cli0"]);
        assert_eq!(variant, Some(DeviceVariant::Fastrak));
    }

    #[test]
    fn test_missing_config_file() {
        let cmd = command(None, None, Some(PathBuf::from("/nonexistent/tracker.toml")));
        let err = cmd.builder().err().expect("missing config must fail");
        assert!(format!("{:#}", err).contains("/nonexistent/tracker.toml"));
    }
}
