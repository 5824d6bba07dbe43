//! 方位角标定
//!
//! 启动后（或收到重新标定请求后）第一个成功解码的样本，
//! 其方位角被记录为偏移量；之后发布的方位角为 `offset - raw`，
//! 即以初始朝向为零点，并翻转符号以匹配上层的旋转方向约定。

/// 标定状态
///
/// 只由采集线程修改；宿主线程通过 `TrackerContext` 中的快照读取。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    offset: Option<f32>,
    armed: bool,
}

impl Calibration {
    /// 新建（已武装：下一个样本将被捕获）
    pub const fn new() -> Self {
        Self {
            offset: None,
            armed: true,
        }
    }

    /// 当前偏移量（未捕获时为 None）
    pub fn offset(&self) -> Option<f32> {
        self.offset
    }

    /// 记录偏移量并解除武装
    pub fn capture(&mut self, azimuth: f32) {
        self.offset = Some(azimuth);
        self.armed = false;
    }

    /// 请求在下一个样本上重新标定
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// 标定后的方位角：`offset - raw`（未标定时偏移量按 0 计算）
    pub fn apply(&self, raw_azimuth: f32) -> f32 {
        self.offset.unwrap_or(0.0) - raw_azimuth
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new()
    }
}
