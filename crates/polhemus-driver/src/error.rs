//! 驱动层错误类型定义

use polhemus_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 没有提供任何串口
    #[error("No serial ports given")]
    NoPorts,

    /// 所有候选串口都无法打开或配置（`last` 为最后一个串口的错误）
    #[error("No usable serial port ({attempts} tried), last error: {last}")]
    NoUsablePort {
        attempts: usize,
        #[source]
        last: SerialError,
    },

    /// 无法识别的设备型号名称
    #[error("Unknown tracker type '{0}'")]
    UnknownVariant(String),

    /// 未指定设备型号
    #[error("Tracker type not specified")]
    MissingVariant,

    /// 串口错误
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 采集线程已经在运行
    #[error("Tracker is already running")]
    AlreadyRunning,

    /// 无法创建采集线程
    #[error("Failed to spawn acquisition thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// 采集线程 panic（串口随线程一起丢失）
    #[error("Acquisition thread panicked")]
    WorkerPanicked,

    /// 配置文件错误
    #[error("Invalid configuration: {0}")]
    Config(String),
}
