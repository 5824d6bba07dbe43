//! # Polhemus Protocol
//!
//! Polhemus Fastrak / Patriot 串口 ASCII 协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `variant`: 设备型号（行宽、握手命令）
//! - `sample`: 数据行解析（固定列宽）
//! - `encode`: 数据行生成（测试、模拟设备使用）
//!
//! ## 行格式
//!
//! 设备以连续模式输出 ASCII 行，每行以 `<CR><LF>` 结尾，总宽度固定：
//!
//! ```text
//! 02   20.40 -61.06  30.01-150.70 -42.08 156.93\r\n
//! └┬┘└──┬──┘└──┬──┘└──┬──┘└──┬──┘└──┬──┘└──┬──┘
//! 头部   x      y      z    方位角  俯仰角  横滚角
//! ```
//!
//! 相邻字段之间不一定有空格（如 `30.01-150.70`），因此只能按列宽切分，
//! 不能按空白分词。

pub mod encode;
pub mod sample;
pub mod variant;

pub use encode::encode_line;
pub use sample::{FIELD_NAMES, Sample, SampleDecoder};
pub use variant::DeviceVariant;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Unknown device variant: {0:?} (expected \"fastrak\", \"polhemus\" or \"patriot\")")]
    UnknownVariant(String),

    #[error("Invalid value for field {field}: {text:?}")]
    InvalidField { field: &'static str, text: String },

    #[error("Line is not terminated by CR LF")]
    MissingTerminator,

    #[error("Value for field {field} does not fit into {width} columns: {value}")]
    ValueOutOfRange {
        field: &'static str,
        width: usize,
        value: f32,
    },
}
