//! # Polhemus Serial Channel Layer
//!
//! 串口传输层：打开并配置串口、发送握手命令、按行读取设备输出。
//!
//! ## 结构
//!
//! - [`SerialChannel`]: 工作线程所依赖的串口抽象（带超时的逐字节读取）
//! - [`TtyPort`]: 基于 termios 的实现（unix）
//! - [`LineReader`]: 以 `<LF>` 分帧，可在等待过程中被取消
//! - `mock`: 无硬件的模拟串口（`mock` feature）

use polhemus_protocol::DeviceVariant;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

pub mod line;
#[cfg(feature = "mock")]
pub mod mock;
#[cfg(unix)]
pub mod tty;

pub use line::{FrameFault, LineReader, RawLine, ReadEvent};
#[cfg(feature = "mock")]
pub use mock::{MockChannel, MockDevice};
#[cfg(unix)]
pub use tty::{BAUD_RATE, TtyPort, open_channel};

/// 默认的单次等待超时（poll 超时）
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// 串口层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// 打开 / 配置串口的某一步失败
    #[error("Failed to {step} on serial port '{port}': {source}")]
    Setup {
        port: String,
        step: ConfigStep,
        #[source]
        source: std::io::Error,
    },
    #[error("Read timeout")]
    Timeout,
    #[error("Serial port disconnected")]
    Disconnected,
}

impl SerialError {
    pub fn setup(port: impl Into<String>, step: ConfigStep, source: std::io::Error) -> Self {
        Self::Setup {
            port: port.into(),
            step,
            source,
        }
    }

    /// 配置失败时对应的步骤
    pub fn step(&self) -> Option<ConfigStep> {
        match self {
            Self::Setup { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// 把 IO 错误归到某个配置步骤下（其他错误保持不变）
    fn during(self, port: &str, step: ConfigStep) -> Self {
        match self {
            Self::Io(source) => Self::setup(port, step, source),
            other => other,
        }
    }
}

/// 串口配置步骤（用于定位配置失败的位置）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStep {
    Open,
    ClearNonBlocking,
    GetAttributes,
    SetSpeed,
    SetAttributes,
    Handshake,
    Flush,
}

impl fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Open => "open",
            Self::ClearNonBlocking => "clear O_NONBLOCK",
            Self::GetAttributes => "get attributes",
            Self::SetSpeed => "set speed",
            Self::SetAttributes => "apply attributes",
            Self::Handshake => "send handshake",
            Self::Flush => "flush output",
        };
        f.write_str(text)
    }
}

/// 串口通道抽象
///
/// 通道由工作线程独占使用；`receive_byte` 必须是有界等待，
/// 以便工作线程能在超时后检查停止标志。
pub trait SerialChannel {
    /// 读取一个字节
    ///
    /// # 错误
    /// - `SerialError::Timeout`: 在读超时内没有数据（可重试）
    /// - `SerialError::Disconnected`: 对端关闭 / 设备拔出
    /// - `SerialError::Io`: 其他 IO 错误
    fn receive_byte(&mut self) -> Result<u8, SerialError>;

    /// 设置单次等待的超时
    fn set_read_timeout(&mut self, timeout: Duration);

    fn send(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 等待已写入的数据全部发出
    fn flush(&mut self) -> Result<(), SerialError>;

    /// 通道标识（日志使用）
    fn name(&self) -> &str;
}

/// 发送型号对应的握手命令，切换设备到连续输出模式
///
/// 写入后立即 flush，确保命令真正到达设备。
pub fn handshake<C: SerialChannel + ?Sized>(
    channel: &mut C,
    variant: DeviceVariant,
) -> Result<(), SerialError> {
    let command = variant.handshake();
    channel
        .send(command)
        .map_err(|e| e.during(channel.name(), ConfigStep::Handshake))?;
    channel.flush().map_err(|e| e.during(channel.name(), ConfigStep::Flush))?;
    trace!(
        "Sent {} handshake {:?} on '{}'",
        variant,
        command,
        channel.name()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// 记录写入内容的通道
    #[derive(Default)]
    struct RecordingChannel {
        written: Vec<u8>,
        flushed: bool,
        fail_send: bool,
    }

    impl SerialChannel for RecordingChannel {
        fn receive_byte(&mut self) -> Result<u8, SerialError> {
            Err(SerialError::Timeout)
        }

        fn set_read_timeout(&mut self, _timeout: Duration) {}

        fn send(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
            if self.fail_send {
                return Err(SerialError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
            }
            self.written.extend_from_slice(bytes);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), SerialError> {
            self.flushed = true;
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn test_handshake_writes_variant_command() {
        let mut channel = RecordingChannel::default();
        handshake(&mut channel, DeviceVariant::Fastrak).unwrap();
        assert_eq!(channel.written, b"C");
        assert!(channel.flushed);

        let mut channel = RecordingChannel::default();
        handshake(&mut channel, DeviceVariant::Patriot).unwrap();
        assert_eq!(channel.written, b"C\r");
    }

    #[test]
    fn test_handshake_failure_names_step() {
        let mut channel = RecordingChannel {
            fail_send: true,
            ..Default::default()
        };
        let err = handshake(&mut channel, DeviceVariant::Fastrak).unwrap_err();
        assert_eq!(err.step(), Some(ConfigStep::Handshake));
        assert!(!channel.flushed);

        let msg = err.to_string();
        assert!(msg.contains("send handshake") && msg.contains("recording"), "{}", msg);
    }

    #[test]
    fn test_serial_error_display() {
        assert_eq!(SerialError::Timeout.to_string(), "Read timeout");
        assert_eq!(
            SerialError::Disconnected.to_string(),
            "Serial port disconnected"
        );

        let err = SerialError::setup(
            "/dev/ttyS0",
            ConfigStep::SetSpeed,
            io::Error::from(io::ErrorKind::InvalidInput),
        );
        assert!(err.to_string().starts_with("Failed to set speed on serial port '/dev/ttyS0'"));
        assert_eq!(err.step(), Some(ConfigStep::SetSpeed));
        assert_eq!(SerialError::Timeout.step(), None);
    }
}
