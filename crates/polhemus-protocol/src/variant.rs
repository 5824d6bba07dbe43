//! 设备型号定义
//!
//! Fastrak 与 Patriot 的区别只在行宽和切换连续模式的命令上。

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 行终止符长度（`<CR><LF>`）
pub const TERMINATOR_LEN: usize = 2;

/// 每行的数值字段个数（x, y, z, azimuth, elevation, roll）
pub const FIELD_COUNT: usize = 6;

/// 设备型号
///
/// 构造后不可变，所有依赖型号的常量都通过穷举 `match` 获取，
/// 不支持的型号在解析阶段（`FromStr`）即被拒绝。
///
/// # 示例
///
/// ```
/// use polhemus_protocol::DeviceVariant;
///
/// let variant: DeviceVariant = "polhemus".parse().unwrap();
/// assert_eq!(variant, DeviceVariant::Fastrak);
/// assert_eq!(variant.line_len(), 47);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DeviceVariant {
    /// Polhemus Fastrak（4 个传感器插口，每行 47 字节）
    ///
    /// 为兼容旧配置，`"polhemus"` 也解析为 Fastrak。
    #[cfg_attr(feature = "serde", serde(alias = "polhemus"))]
    Fastrak,
    /// Polhemus Patriot（2 个传感器插口，每行 60 字节）
    Patriot,
}

impl DeviceVariant {
    /// 一行的总字节数（含 `<CR><LF>`）
    pub const fn line_len(self) -> usize {
        match self {
            Self::Fastrak => 47,
            Self::Patriot => 60,
        }
    }

    /// 单个数值字段的列宽
    pub const fn field_width(self) -> usize {
        match self {
            Self::Fastrak => 7,
            Self::Patriot => 9,
        }
    }

    /// 头部（传感器编号）列宽
    pub const fn header_len(self) -> usize {
        self.line_len() - TERMINATOR_LEN - FIELD_COUNT * self.field_width()
    }

    /// 切换到连续输出模式的命令
    pub const fn handshake(self) -> &'static [u8] {
        match self {
            Self::Fastrak => b"C",
            Self::Patriot => b"C\r",
        }
    }

    /// 配置文件 / 命令行使用的名称
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fastrak => "fastrak",
            Self::Patriot => "patriot",
        }
    }
}

impl fmt::Display for DeviceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceVariant {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastrak" | "polhemus" => Ok(Self::Fastrak),
            "patriot" => Ok(Self::Patriot),
            _ => Err(ProtocolError::UnknownVariant(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_layout() {
        assert_eq!(DeviceVariant::Fastrak.header_len(), 3);
        assert_eq!(DeviceVariant::Patriot.header_len(), 4);

        for variant in [DeviceVariant::Fastrak, DeviceVariant::Patriot] {
            let total = variant.header_len()
                + FIELD_COUNT * variant.field_width()
                + TERMINATOR_LEN;
            assert_eq!(total, variant.line_len());
        }
    }

    #[test]
    fn test_handshake_bytes() {
        assert_eq!(DeviceVariant::Fastrak.handshake(), b"C");
        assert_eq!(DeviceVariant::Patriot.handshake(), b"C\r");
    }

    #[test]
    fn test_parse_accepts_legacy_alias() {
        assert_eq!("fastrak".parse::<DeviceVariant>(), Ok(DeviceVariant::Fastrak));
        assert_eq!("polhemus".parse::<DeviceVariant>(), Ok(DeviceVariant::Fastrak));
        assert_eq!(" Patriot ".parse::<DeviceVariant>(), Ok(DeviceVariant::Patriot));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "liberty".parse::<DeviceVariant>().unwrap_err();
        assert_eq!(err, ProtocolError::UnknownVariant("liberty".to_string()));
        assert!(err.to_string().contains("liberty"));
    }

    #[test]
    fn test_display_roundtrip() {
        for variant in [DeviceVariant::Fastrak, DeviceVariant::Patriot] {
            assert_eq!(variant.to_string().parse::<DeviceVariant>(), Ok(variant));
        }
    }
}
