//! 数据行解析
//!
//! 只接受宽度与型号完全一致的行；宽度不符时返回 `Ok(None)`，
//! 这在多传感器交错输出或热插拔时是正常现象，不视为错误。

use crate::ProtocolError;
use crate::variant::{DeviceVariant, FIELD_COUNT, TERMINATOR_LEN};

/// 数值字段名称（按行内从左到右的顺序）
pub const FIELD_NAMES: [&str; FIELD_COUNT] = ["x", "y", "z", "azimuth", "elevation", "roll"];

/// 一行解析后的 6 自由度数据
///
/// 角度单位为度，位置单位由设备配置决定（本驱动只使用方位角）。
/// `Default` 为全零读数，对应尚未收到任何有效行的状态。
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// 传感器编号（如 `"01"`；热插拔时可能出现 `"02d"` 之类的异常标记）
    pub header: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// 方位角（度）
    pub azimuth: f32,
    /// 俯仰角（度）
    pub elevation: f32,
    /// 横滚角（度）
    pub roll: f32,
}

impl Sample {
    /// 按行内顺序返回 6 个数值字段
    pub fn fields(&self) -> [f32; FIELD_COUNT] {
        [self.x, self.y, self.z, self.azimuth, self.elevation, self.roll]
    }

    fn from_fields(header: String, fields: [f32; FIELD_COUNT]) -> Self {
        let [x, y, z, azimuth, elevation, roll] = fields;
        Self {
            header,
            x,
            y,
            z,
            azimuth,
            elevation,
            roll,
        }
    }
}

/// 数据行解码器
///
/// # 示例
///
/// ```
/// use polhemus_protocol::{DeviceVariant, SampleDecoder};
///
/// let decoder = SampleDecoder::new(DeviceVariant::Fastrak);
/// let line = b"02   20.40 -61.06  30.01-150.70 -42.08 156.93\r\n";
/// let sample = decoder.decode(line).unwrap().unwrap();
/// assert_eq!(sample.header, "02");
/// assert_eq!(sample.azimuth, -150.70);
///
/// // 宽度不符：不产生数据，也不是错误
/// assert_eq!(decoder.decode(b"02   20.40\r\n").unwrap(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleDecoder {
    variant: DeviceVariant,
}

impl SampleDecoder {
    pub const fn new(variant: DeviceVariant) -> Self {
        Self { variant }
    }

    pub const fn variant(&self) -> DeviceVariant {
        self.variant
    }

    /// 解析一行
    ///
    /// # 返回值
    /// - `Ok(Some(sample))`: 宽度正确且所有字段均可解析
    /// - `Ok(None)`: 宽度与型号不符（不尝试解析）
    /// - `Err(_)`: 宽度正确，但终止符或某个字段无法解析
    ///
    /// 不做任何跨字段或取值范围校验。
    pub fn decode(&self, line: &[u8]) -> Result<Option<Sample>, ProtocolError> {
        if line.len() != self.variant.line_len() {
            return Ok(None);
        }

        let (body, terminator) = line.split_at(line.len() - TERMINATOR_LEN);
        if terminator != b"\r\n" {
            return Err(ProtocolError::MissingTerminator);
        }

        let (header, columns) = body.split_at(self.variant.header_len());
        let header = std::str::from_utf8(header)
            .map_err(|_| ProtocolError::InvalidField {
                field: "header",
                text: String::from_utf8_lossy(header).into_owned(),
            })?
            .trim()
            .to_string();

        let mut fields = [0.0f32; FIELD_COUNT];
        for ((column, slot), name) in columns
            .chunks_exact(self.variant.field_width())
            .zip(fields.iter_mut())
            .zip(FIELD_NAMES)
        {
            *slot = parse_field(name, column)?;
        }

        Ok(Some(Sample::from_fields(header, fields)))
    }
}

/// 解析单个定宽数值列（允许前导空格填充和可选符号）
fn parse_field(field: &'static str, column: &[u8]) -> Result<f32, ProtocolError> {
    let invalid = || ProtocolError::InvalidField {
        field,
        text: String::from_utf8_lossy(column).into_owned(),
    };

    let text = std::str::from_utf8(column).map_err(|_| invalid())?.trim();
    if text.is_empty() {
        return Err(invalid());
    }
    text.parse::<f32>().map_err(|_| invalid())
}
