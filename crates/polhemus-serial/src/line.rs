//! 行分帧
//!
//! 逐字节读取直到 `<LF>`。每次等待都是有界的（串口读超时），
//! 等待之前检查运行标志，因此停止请求最多延迟一个 poll 周期，
//! 即使当前行只读到一半。

use crate::{SerialChannel, SerialError};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::trace;

/// 行终止标记
pub const LINE_FEED: u8 = b'\n';

/// 一行的字节缓冲区
///
/// 设备行宽最大 60 字节，常规情况下不会发生堆分配；不设长度上限。
pub type RawLine = SmallVec<[u8; 64]>;

/// 读取过程中的故障（可恢复，由调用方决定是否继续）
#[derive(Error, Debug)]
pub enum FrameFault {
    /// 等待超时，没有任何数据到达
    #[error("No data within read timeout")]
    Timeout,
    /// 读取失败
    #[error("Read failed: {0}")]
    Read(#[source] SerialError),
}

impl FrameFault {
    /// 通道是否已确定不可用（对端关闭 / 设备拔出）
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Read(SerialError::Disconnected))
    }
}

impl From<SerialError> for FrameFault {
    fn from(e: SerialError) -> Self {
        match e {
            SerialError::Timeout => Self::Timeout,
            other => Self::Read(other),
        }
    }
}

/// 一次 `read_line` 的结果
#[derive(Debug)]
pub enum ReadEvent {
    /// 读到完整的一行（含 `<LF>`），内容在调用方传入的 `RawLine` 中
    Line,
    /// 发生故障；已读到的部分保留在 `RawLine` 中，再次调用会继续拼接
    Fault(FrameFault),
    /// 运行标志被清除
    Cancelled,
}

/// 行读取器
///
/// 无内部状态；部分行的字节保存在调用方的 `RawLine` 中。
#[derive(Debug, Default, Clone, Copy)]
pub struct LineReader {
    _private: (),
}

impl LineReader {
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// 读取字节并追加到 `line`，直到 `<LF>`、故障或取消
    ///
    /// 不会清空 `line`：调用方在开始新的一行之前负责 `clear()`。
    pub fn read_line<C: SerialChannel + ?Sized>(
        &self,
        channel: &mut C,
        line: &mut RawLine,
        running: &AtomicBool,
    ) -> ReadEvent {
        loop {
            // Acquire: 与 stop() 中的 Release 配对
            if !running.load(Ordering::Acquire) {
                trace!(
                    "Line read cancelled with {} pending bytes on '{}'",
                    line.len(),
                    channel.name()
                );
                return ReadEvent::Cancelled;
            }

            match channel.receive_byte() {
                Ok(byte) => {
                    line.push(byte);
                    if byte == LINE_FEED {
                        return ReadEvent::Line;
                    }
                },
                Err(e) => return ReadEvent::Fault(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// 按脚本返回结果的通道
    struct ScriptedChannel {
        script: VecDeque<Result<u8, SerialError>>,
    }

    impl ScriptedChannel {
        fn new(script: Vec<Result<u8, SerialError>>) -> Self {
            Self {
                script: script.into(),
            }
        }

        fn bytes(data: &[u8]) -> Vec<Result<u8, SerialError>> {
            data.iter().copied().map(Ok).collect()
        }
    }

    impl SerialChannel for ScriptedChannel {
        fn receive_byte(&mut self) -> Result<u8, SerialError> {
            self.script.pop_front().unwrap_or(Err(SerialError::Timeout))
        }

        fn set_read_timeout(&mut self, _timeout: Duration) {}

        fn send(&mut self, _bytes: &[u8]) -> Result<(), SerialError> {
            Ok(())
        }

        fn flush(&mut self) -> Result<(), SerialError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn test_reads_up_to_line_feed() {
        let mut channel = ScriptedChannel::new(ScriptedChannel::bytes(b"ab\r\ncd\r\n"));
        let running = AtomicBool::new(true);
        let reader = LineReader::new();
        let mut line = RawLine::new();

        assert!(matches!(
            reader.read_line(&mut channel, &mut line, &running),
            ReadEvent::Line
        ));
        assert_eq!(&line[..], b"ab\r\n");

        line.clear();
        assert!(matches!(
            reader.read_line(&mut channel, &mut line, &running),
            ReadEvent::Line
        ));
        assert_eq!(&line[..], b"cd\r\n");
    }

    #[test]
    fn test_fault_keeps_partial_line() {
        let mut script = ScriptedChannel::bytes(b"01 ");
        script.push(Err(SerialError::Timeout));
        script.extend(ScriptedChannel::bytes(b"2\r\n"));
        let mut channel = ScriptedChannel::new(script);

        let running = AtomicBool::new(true);
        let reader = LineReader::new();
        let mut line = RawLine::new();

        match reader.read_line(&mut channel, &mut line, &running) {
            ReadEvent::Fault(FrameFault::Timeout) => {},
            other => panic!("Expected timeout fault, got {:?}", other),
        }
        assert_eq!(&line[..], b"01 ");

        // 再次调用继续拼接同一行
        assert!(matches!(
            reader.read_line(&mut channel, &mut line, &running),
            ReadEvent::Line
        ));
        assert_eq!(&line[..], b"01 2\r\n");
    }

    #[test]
    fn test_read_error_is_reported() {
        let mut channel = ScriptedChannel::new(vec![Err(SerialError::Disconnected)]);
        let running = AtomicBool::new(true);
        let mut line = RawLine::new();

        match LineReader::new().read_line(&mut channel, &mut line, &running) {
            ReadEvent::Fault(fault) => assert!(fault.is_disconnect()),
            other => panic!("Expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_before_reading() {
        let mut channel = ScriptedChannel::new(ScriptedChannel::bytes(b"ab\r\n"));
        let running = AtomicBool::new(false);
        let mut line = RawLine::new();

        assert!(matches!(
            LineReader::new().read_line(&mut channel, &mut line, &running),
            ReadEvent::Cancelled
        ));
        assert!(line.is_empty());
        // 未消费任何字节
        assert_eq!(channel.script.len(), 4);
    }

    #[test]
    fn test_long_line_spills_without_cap() {
        let mut data = vec![b'x'; 200];
        data.push(LINE_FEED);
        let mut channel = ScriptedChannel::new(ScriptedChannel::bytes(&data));
        let running = AtomicBool::new(true);
        let mut line = RawLine::new();

        assert!(matches!(
            LineReader::new().read_line(&mut channel, &mut line, &running),
            ReadEvent::Line
        ));
        assert_eq!(line.len(), 201);
        assert!(line.spilled());
    }
}
