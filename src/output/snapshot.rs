// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/snapshot.rs - 检测快照保存
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::info;

use crate::{frame::Frame, frame::FrameError, model::DetectionResult, output::draw::Draw};

#[derive(Error, Debug)]
pub enum SnapshotError {
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("帧错误: {0}")]
  FrameError(#[from] FrameError),
}

/// 把帧和检测结果保存为 `<时间戳>.jpg` 与 `<时间戳>.json`。
pub struct SnapshotWriter {
  directory: PathBuf,
  draw: Draw,
}

impl SnapshotWriter {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      draw: Draw::default(),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// 返回不带扩展名的基础路径。
  pub fn save(
    &self,
    frame: &Frame,
    detections: &[DetectionResult],
  ) -> Result<PathBuf, SnapshotError> {
    std::fs::create_dir_all(&self.directory)?;
    let base = self.unique_base();

    let mut image = frame.to_rgb_image()?;
    self.draw.draw_detections(&mut image, detections);
    image.save(base.with_extension("jpg"))?;

    let json = serde_json::to_string_pretty(detections)?;
    std::fs::write(base.with_extension("json"), json)?;

    info!("快照已保存: {}.[jpg|json]", base.display());
    Ok(base)
  }

  fn unique_base(&self) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S_%6f").to_string();
    let mut base = self.directory.join(&stamp);
    let mut n = 1;
    while base.with_extension("jpg").exists() || base.with_extension("json").exists() {
      base = self.directory.join(format!("{}_{}", stamp, n));
      n += 1;
    }
    base
  }
}

/// 使用默认绘制方式保存快照。
pub fn save_detection_snapshot(
  frame: &Frame,
  detections: &[DetectionResult],
  output_dir: &Path,
) -> Result<PathBuf, SnapshotError> {
  SnapshotWriter::new(output_dir).save(frame, detections)
}
