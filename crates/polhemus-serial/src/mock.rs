//! 模拟串口（无硬件依赖）
//!
//! `MockChannel` 交给工作线程使用，测试代码通过 `MockDevice` 句柄
//! 从另一个线程注入字节、读故障或断开事件，并检查驱动写入的命令。

use crate::{DEFAULT_READ_TIMEOUT, SerialChannel, SerialError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 注入到模拟串口的事件
#[derive(Debug)]
enum MockInput {
    Bytes(Vec<u8>),
    Error(io::ErrorKind),
    Disconnect,
}

/// 模拟串口（通道端）
///
/// # 示例
///
/// ```
/// use polhemus_serial::{LineReader, MockChannel, RawLine, ReadEvent};
/// use std::sync::atomic::AtomicBool;
///
/// let (mut channel, device) = MockChannel::new();
/// device.push_bytes(b"01 ...\r\n");
///
/// let running = AtomicBool::new(true);
/// let mut line = RawLine::new();
/// let event = LineReader::new().read_line(&mut channel, &mut line, &running);
/// assert!(matches!(event, ReadEvent::Line));
/// assert_eq!(&line[..], b"01 ...\r\n");
/// ```
#[derive(Debug)]
pub struct MockChannel {
    name: String,
    rx: Receiver<MockInput>,
    pending: VecDeque<u8>,
    read_timeout: Duration,
    written: Arc<Mutex<Vec<u8>>>,
    fail_send: bool,
    /// 收到断开事件后保持断开（与挂断的 tty 一致）
    hung_up: bool,
}

/// 模拟设备（测试端句柄）
///
/// 可以 Clone，在多个线程中使用。Drop 所有句柄等同于拔出设备。
#[derive(Debug, Clone)]
pub struct MockDevice {
    tx: Sender<MockInput>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl MockChannel {
    pub fn new() -> (Self, MockDevice) {
        Self::named("mock")
    }

    pub fn named(name: impl Into<String>) -> (Self, MockDevice) {
        let (tx, rx) = unbounded();
        let written = Arc::new(Mutex::new(Vec::new()));
        let channel = Self {
            name: name.into(),
            rx,
            pending: VecDeque::new(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            written: written.clone(),
            fail_send: false,
            hung_up: false,
        };
        (channel, MockDevice { tx, written })
    }

    /// 让后续 `send` 失败（模拟握手写入失败）
    pub fn fail_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl SerialChannel for MockChannel {
    fn receive_byte(&mut self) -> Result<u8, SerialError> {
        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(byte);
            }
            if self.hung_up {
                return Err(SerialError::Disconnected);
            }

            match self.rx.recv_timeout(self.read_timeout) {
                Ok(MockInput::Bytes(bytes)) => self.pending.extend(bytes),
                Ok(MockInput::Error(kind)) => return Err(SerialError::Io(io::Error::from(kind))),
                Ok(MockInput::Disconnect) => {
                    self.hung_up = true;
                    return Err(SerialError::Disconnected);
                },
                Err(RecvTimeoutError::Timeout) => return Err(SerialError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(SerialError::Disconnected),
            }
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        if self.fail_send {
            return Err(SerialError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        if let Ok(mut written) = self.written.lock() {
            written.extend_from_slice(bytes);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SerialError> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl MockDevice {
    /// 设备输出字节
    pub fn push_bytes(&self, bytes: &[u8]) {
        let _ = self.tx.send(MockInput::Bytes(bytes.to_vec()));
    }

    /// 注入一次读错误
    pub fn inject_error(&self, kind: io::ErrorKind) {
        let _ = self.tx.send(MockInput::Error(kind));
    }

    /// 注入断开事件：此后每次读取都返回 `Disconnected`
    pub fn disconnect(&self) {
        let _ = self.tx.send(MockInput::Disconnect);
    }

    /// 驱动写入设备的全部字节
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().map(|w| w.clone()).unwrap_or_default()
    }
}
