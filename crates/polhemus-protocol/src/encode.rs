//! 数据行生成
//!
//! 按设备的格式生成一行：头部左对齐，数值右对齐、两位小数，末尾 `<CR><LF>`。
//! 驱动本身从不向设备发送数据行，此模块供模拟设备和测试使用。

use crate::ProtocolError;
use crate::sample::FIELD_NAMES;
use crate::variant::{DeviceVariant, FIELD_COUNT};
use std::fmt::Write as _;

/// 生成一行设备输出
///
/// # 错误
/// - `ProtocolError::InvalidField`: 头部超出列宽或包含非 ASCII 字符
/// - `ProtocolError::ValueOutOfRange`: 数值格式化后超出列宽
///
/// # 示例
///
/// ```
/// use polhemus_protocol::{DeviceVariant, encode_line};
///
/// let line = encode_line(
///     DeviceVariant::Fastrak,
///     "02",
///     &[20.40, -61.06, 30.01, -150.70, -42.08, 156.93],
/// )
/// .unwrap();
/// assert_eq!(line, b"02   20.40 -61.06  30.01-150.70 -42.08 156.93\r\n");
/// ```
pub fn encode_line(
    variant: DeviceVariant,
    header: &str,
    fields: &[f32; FIELD_COUNT],
) -> Result<Vec<u8>, ProtocolError> {
    let header_len = variant.header_len();
    if header.len() > header_len || !header.is_ascii() {
        return Err(ProtocolError::InvalidField {
            field: "header",
            text: header.to_string(),
        });
    }

    let width = variant.field_width();
    let mut line = String::with_capacity(variant.line_len());
    let _ = write!(line, "{:<header_len$}", header);

    for (&value, field) in fields.iter().zip(FIELD_NAMES) {
        let start = line.len();
        let _ = write!(line, "{:>width$.2}", value);
        if line.len() - start > width {
            return Err(ProtocolError::ValueOutOfRange {
                field,
                width,
                value,
            });
        }
    }

    line.push_str("\r\n");
    debug_assert_eq!(line.len(), variant.line_len());
    Ok(line.into_bytes())
}
