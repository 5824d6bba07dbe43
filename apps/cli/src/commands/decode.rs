//! 离线解码命令
//!
//! 读取抓取的串口数据（原始字节），按 `<LF>` 分行解码并打印，
//! 用于检查线路上的实际输出（行宽、交错、热插拔产生的异常 header）。

use anyhow::{Context, Result};
use clap::Args;
use polhemus_driver::Calibration;
use polhemus_protocol::{DeviceVariant, SampleDecoder};
use std::path::PathBuf;
use tracing::info;

/// 离线解码命令参数
#[derive(Args, Debug)]
pub struct DecodeCommand {
    /// 设备型号（fastrak / polhemus / patriot）
    #[arg(short, long)]
    pub variant: String,

    /// 同时输出以第一个有效样本为零点的方位角
    #[arg(long)]
    pub calibrated: bool,

    /// 抓取的数据文件
    pub file: PathBuf,
}

impl DecodeCommand {
    pub fn execute(&self) -> Result<()> {
        let variant: DeviceVariant = self.variant.parse()?;
        let data = std::fs::read(&self.file)
            .with_context(|| format!("Failed to read {}", self.file.display()))?;

        let report = decode_capture(variant, &data, self.calibrated);
        for line in &report.lines {
            println!("{}", line);
        }

        info!(
            "{} lines: {} decoded, {} rejected",
            report.decoded + report.rejected,
            report.decoded,
            report.rejected
        );
        Ok(())
    }
}

/// 解码结果
#[derive(Debug, Default)]
struct DecodeReport {
    lines: Vec<String>,
    decoded: usize,
    rejected: usize,
}

fn decode_capture(variant: DeviceVariant, data: &[u8], calibrated: bool) -> DecodeReport {
    let decoder = SampleDecoder::new(variant);
    let mut calibration = Calibration::new();
    let mut report = DecodeReport::default();

    for (index, line) in data.split_inclusive(|&b| b == b'\n').enumerate() {
        let number = index + 1;
        let text = match decoder.decode(line) {
            Ok(Some(sample)) => {
                report.decoded += 1;
                let mut text = format!(
                    "{:>5}  {:<4} x={:>8.2} y={:>8.2} z={:>8.2} az={:>8.2} el={:>8.2} roll={:>8.2}",
                    number,
                    sample.header,
                    sample.x,
                    sample.y,
                    sample.z,
                    sample.azimuth,
                    sample.elevation,
                    sample.roll
                );
                if calibrated {
                    if calibration.is_armed() {
                        calibration.capture(sample.azimuth);
                    }
                    text.push_str(&format!(" -> {:>8.2}", calibration.apply(sample.azimuth)));
                }
                text
            },
            Ok(None) => {
                report.rejected += 1;
                format!(
                    "{:>5}  rejected: {} bytes (expected {})",
                    number,
                    line.len(),
                    variant.line_len()
                )
            },
            Err(e) => {
                report.rejected += 1;
                format!("{:>5}  rejected: {}", number, e)
            },
        };
        report.lines.push(text);
    }

    report
}
