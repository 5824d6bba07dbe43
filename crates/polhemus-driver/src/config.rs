//! 配置文件
//!
//! ```toml
//! variant = "patriot"
//! ports = "/dev/ttyUSB0 /dev/ttyS0"
//!
//! [pipeline]
//! poll_timeout_ms = 100
//! fault_threshold = 50
//! idle_threshold = 0
//! ```

use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use polhemus_protocol::DeviceVariant;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tracker 配置（TOML）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// 设备型号（`fastrak` / `polhemus` / `patriot`）
    pub variant: DeviceVariant,
    /// 以空白分隔的候选串口
    #[serde(default)]
    pub ports: String,
    /// Pipeline 参数（缺省字段取默认值）
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl TrackerConfig {
    /// 解析并检查 Pipeline 参数范围
    pub fn from_toml_str(text: &str) -> Result<Self, DriverError> {
        let config: Self = toml::from_str(text).map_err(|e| DriverError::Config(e.to_string()))?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// 读取并解析配置文件
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DriverError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string(self).map_err(|e| DriverError::Config(e.to_string()))
    }
}
