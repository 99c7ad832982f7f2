// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 检测框绘制
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

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};

use crate::model::DetectionResult;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色

/// 在帧上绘制检测框。配置了字体时同时绘制 `name (0.90)` 标签。
pub struct Draw {
  font: Option<FontVec>,
  color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      color: BOX_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font_file(mut self, path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(|_| DrawError::InvalidFont)?;
    self.font = Some(font);
    Ok(self)
  }

  pub fn with_color(mut self, color: [u8; 3]) -> Self {
    self.color = color;
    self
  }

  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[DetectionResult]) {
    for detection in detections {
      self.draw_detection(image, detection);
    }
  }

  fn draw_detection(&self, image: &mut RgbImage, detection: &DetectionResult) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }
    let [x_min, y_min, x_max, y_max] = detection.ordered_bbox();

    let x_min = (x_min.floor() as i32).clamp(0, w - 1);
    let y_min = (y_min.floor() as i32).clamp(0, h - 1);
    let x_max = (x_max.ceil() as i32).clamp(0, w - 1);
    let y_max = (y_max.ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = Rgb(self.color);
    for t in 0..BOX_THICKNESS {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
      draw_hollow_rect_mut(image, rect, color);
    }

    if let Some(font) = &self.font {
      let label = format!("{} ({:.2})", detection.class_name, detection.confidence);
      let text_width = (label.chars().count() as f32 * LABEL_CHAR_WIDTH) as i32;
      let label_y = (y_min - LABEL_TEXT_HEIGHT).max(0);
      let label_width = text_width.min(w - x_min);
      if label_width <= 0 {
        return;
      }

      let rect = Rect::at(x_min, label_y).of_size(label_width as u32, LABEL_TEXT_HEIGHT as u32);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        Rgb([255u8, 255u8, 255u8]),
        x_min,
        label_y + LABEL_TEXT_VERTICAL_PADDING,
        PxScale::from(LABEL_FONT_SIZE),
        font,
        &label,
      );
    }
  }
}

#[derive(thiserror::Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效")]
  InvalidFont,
}
