//! termios 串口实现
//!
//! 打开流程：
//! 1. `O_RDWR | O_NOCTTY | O_NONBLOCK` 打开（没有载波检测信号时也不会阻塞）
//! 2. 清除 `O_NONBLOCK`，后续读写恢复阻塞语义（超时由 poll 控制）
//! 3. raw 模式、`CLOCAL | CREAD`、115200 波特率
//! 4. 发送握手命令并等待发送完成
//!
//! ## 限制
//!
//! - **仅限 unix 平台**
//! - **权限要求**：通常需要 `dialout` 组权限

use crate::{ConfigStep, DEFAULT_READ_TIMEOUT, SerialChannel, SerialError, handshake};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{self, BaudRate, ControlFlags, SetArg};
use polhemus_protocol::DeviceVariant;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::time::Duration;
use tracing::{debug, trace};

/// 设备固定波特率
pub const BAUD_RATE: BaudRate = BaudRate::B115200;

/// 单次 read(2) 的最大字节数
const RX_CHUNK: usize = 64;

/// termios 串口
///
/// 文件描述符由 `File` 独占持有，Drop 时关闭（只关闭一次）。
///
/// # 示例
///
/// ```no_run
/// use polhemus_protocol::DeviceVariant;
/// use polhemus_serial::{SerialChannel, open_channel};
///
/// let mut port = open_channel("/dev/ttyS0", DeviceVariant::Fastrak).unwrap();
/// let byte = port.receive_byte();
/// ```
#[derive(Debug)]
pub struct TtyPort {
    file: File,
    path: String,
    read_timeout: Duration,
    rx_buf: [u8; RX_CHUNK],
    rx_pos: usize,
    rx_len: usize,
}

impl TtyPort {
    /// 打开串口（不修改终端属性）
    ///
    /// # 错误
    /// - `SerialError::Setup { step: Open, .. }`: 设备不存在或无权限
    /// - `SerialError::Setup { step: ClearNonBlocking, .. }`: fcntl 失败
    pub fn open(path: &str) -> Result<Self, SerialError> {
        // O_NONBLOCK 保证没有载波检测信号时 open 也能立即返回
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| SerialError::setup(path, ConfigStep::Open, e))?;

        clear_nonblocking(&file)
            .map_err(|e| SerialError::setup(path, ConfigStep::ClearNonBlocking, e))?;

        trace!("Serial port '{}' opened", path);

        Ok(Self {
            file,
            path: path.to_string(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            rx_buf: [0; RX_CHUNK],
            rx_pos: 0,
            rx_len: 0,
        })
    }

    /// 配置为 raw 模式、115200 波特率
    ///
    /// 速度必须在 `tcsetattr` 之前写入 termios 结构。
    pub fn configure(&mut self) -> Result<(), SerialError> {
        let path = self.path.as_str();

        let mut tio = termios::tcgetattr(&self.file)
            .map_err(|e| SerialError::setup(path, ConfigStep::GetAttributes, e.into()))?;

        termios::cfmakeraw(&mut tio);
        tio.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD;

        termios::cfsetispeed(&mut tio, BAUD_RATE)
            .map_err(|e| SerialError::setup(path, ConfigStep::SetSpeed, e.into()))?;
        termios::cfsetospeed(&mut tio, BAUD_RATE)
            .map_err(|e| SerialError::setup(path, ConfigStep::SetSpeed, e.into()))?;

        termios::tcsetattr(&self.file, SetArg::TCSANOW, &tio)
            .map_err(|e| SerialError::setup(path, ConfigStep::SetAttributes, e.into()))?;

        debug!("Serial port '{}' configured (raw, 115200 baud)", path);
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// 等待数据可读（有界）
    fn wait_readable(&self) -> Result<(), SerialError> {
        let timeout_ms = self.read_timeout.as_millis().min(u16::MAX as u128) as u16;
        let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];

        match poll(&mut fds, PollTimeout::from(timeout_ms)) {
            Ok(0) => Err(SerialError::Timeout),
            Ok(_) => {
                let revents = fds[0].revents().unwrap_or(PollFlags::empty());
                if revents.contains(PollFlags::POLLIN) {
                    Ok(())
                } else if revents
                    .intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL)
                {
                    Err(SerialError::Disconnected)
                } else {
                    Err(SerialError::Timeout)
                }
            },
            // 被信号打断：视为一次空等待
            Err(Errno::EINTR) => Err(SerialError::Timeout),
            Err(e) => Err(SerialError::Io(io::Error::other(format!("poll failed: {}", e)))),
        }
    }
}

impl SerialChannel for TtyPort {
    fn receive_byte(&mut self) -> Result<u8, SerialError> {
        if self.rx_pos < self.rx_len {
            let byte = self.rx_buf[self.rx_pos];
            self.rx_pos += 1;
            return Ok(byte);
        }

        self.wait_readable()?;

        let n = match self.file.read(&mut self.rx_buf) {
            Ok(0) => return Err(SerialError::Disconnected),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Err(SerialError::Timeout),
            // 设备拔出 / pty 对端关闭
            Err(e) if e.raw_os_error() == Some(libc::EIO) => {
                return Err(SerialError::Disconnected);
            },
            Err(e) => return Err(SerialError::Io(e)),
        };

        self.rx_pos = 1;
        self.rx_len = n;
        Ok(self.rx_buf[0])
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.file.write_all(bytes).map_err(SerialError::Io)
    }

    fn flush(&mut self) -> Result<(), SerialError> {
        termios::tcdrain(&self.file).map_err(|e| SerialError::Io(e.into()))
    }

    fn name(&self) -> &str {
        &self.path
    }
}

impl Drop for TtyPort {
    fn drop(&mut self) {
        trace!("[Auto-Drop] Serial port '{}' closed", self.path);
    }
}

/// 打开、配置串口并发送握手命令
///
/// 任何一步失败都返回 `SerialError::Setup`，其中 `step` 指出失败的步骤；
/// 已打开的描述符随 `TtyPort` 一起释放。
pub fn open_channel(path: &str, variant: DeviceVariant) -> Result<TtyPort, SerialError> {
    let mut port = TtyPort::open(path)?;
    port.configure()?;
    handshake(&mut port, variant)?;
    Ok(port)
}

/// 清除 `O_NONBLOCK`，恢复阻塞 IO
fn clear_nonblocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();

    // SAFETY: fd 由 file 持有，在本函数内有效
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: 同上
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
