// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/yolo26.rs - YOLO26 RKNPU 后端
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

use image::imageops::{self, FilterType};
use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  frame::{Frame, FrameError},
  model::{COCO_CLASSES, InferParams, Model, ModelLoader, RawDetection},
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_NUM_OUTPUTS: u32 = 6;
const YOLO26_CLASS_NUM: usize = 80;
const YOLO26_STRIDES: [u32; 3] = [8, 16, 32];

#[derive(Error, Debug)]
pub enum Yolo26Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(rknpu::Error),
  #[error("帧错误: {0}")]
  FrameError(#[from] FrameError),
  #[error("输入尺寸 {0} 必须是 32 的倍数")]
  InputSize(u32),
}

impl From<rknpu::Error> for Yolo26Error {
  fn from(err: rknpu::Error) -> Self {
    Yolo26Error::RknnError(err)
  }
}

impl Yolo26Error {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    Yolo26Error::ModelInvalid(msg.to_string(), e)
  }
}

/// 从 `.rknn` 文件加载 YOLO26 模型。
#[derive(Default)]
pub struct Yolo26Loader {
  flags: InitFlags,
}

impl Yolo26Loader {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }
}

impl ModelLoader for Yolo26Loader {
  type Model = Yolo26;
  type Error = Yolo26Error;

  fn load(&self, path: &Path) -> Result<Yolo26, Yolo26Error> {
    info!("加载模型文件: {}", path.display());
    let model_data = std::fs::read(path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let context = Context::new(&model_data, self.flags.clone())?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(Yolo26Error::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输出数量", e))?;

    if num_inputs != YOLO26_NUM_INPUTS || num_outputs != YOLO26_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(Yolo26Error::invalid(&msg, rknpu::Error::InvalidModel));
    }

    info!("模型加载完成");
    Ok(Yolo26 { context })
  }
}

pub struct Yolo26 {
  context: Context,
}

impl Model for Yolo26 {
  type Error = Yolo26Error;

  fn infer(
    &mut self,
    frame: &Frame,
    params: &InferParams,
  ) -> Result<Vec<RawDetection>, Self::Error> {
    let size = params.image_size;
    if size % 32 != 0 {
      return Err(Yolo26Error::InputSize(size));
    }

    // 缩放到模型输入尺寸，输出坐标再映射回原始帧
    let image = frame.to_rgb_image()?;
    let resized = imageops::resize(&image, size, size, FilterType::Triangle);

    self.context.set_input(
      0,
      resized.as_raw(),
      TensorFormat::NHWC,
      TensorType::UInt8,
    )?;
    self.context.run()?;
    let output = self.context.get_outputs()?;

    let scale_x = frame.width() as f32 / size as f32;
    let scale_y = frame.height() as f32 / size as f32;

    let mut rows = Vec::new();
    for (head_idx, stride) in YOLO26_STRIDES.into_iter().enumerate() {
      let map = (size / stride) as usize;
      let tensor1 = output.get_f32(head_idx * 2)?;
      let tensor2 = output.get_f32(head_idx * 2 + 1)?;

      let Some((reg, cls)) = match_reg_cls_tensors(tensor1, tensor2, map * map) else {
        error!(
          "检测头 {}: 输出大小不匹配 - 张量1: {}, 张量2: {}",
          head_idx,
          tensor1.len(),
          tensor2.len()
        );
        continue;
      };

      decode_head(
        reg,
        cls,
        map,
        stride as f32,
        size as f32,
        params.confidence_threshold,
        &mut |[x1, y1, x2, y2], score, class_id| {
          rows.push(vec![
            x1 * scale_x,
            y1 * scale_y,
            x2 * scale_x,
            y2 * scale_y,
            score,
            class_id as f32,
          ]);
        },
      );
    }

    debug!("检测到 {} 个物体", rows.len());
    Ok(rows)
  }

  fn class_name(&self, class_id: u32) -> Option<&str> {
    COCO_CLASSES.get(class_id as usize).copied()
  }
}

/// RKNN 输出顺序不固定，按张量大小区分回归和分类输出
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  spatial: usize,
) -> Option<(&'a [f32], &'a [f32])> {
  let reg_expected = 4 * spatial;
  let cls_expected = YOLO26_CLASS_NUM * spatial;
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Some((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    Some((tensor2, tensor1))
  } else {
    None
  }
}

fn decode_head(
  reg: &[f32],
  cls: &[f32],
  map: usize,
  stride: f32,
  input: f32,
  threshold: f32,
  emit: &mut dyn FnMut([f32; 4], f32, u32),
) {
  let spatial = map * map;
  for h in 0..map {
    for w in 0..map {
      let idx = h * map + w;

      let (max_logit, class_id) = (0..YOLO26_CLASS_NUM)
        .map(|c| (cls[c * spatial + idx], c as u32))
        .fold((f32::MIN, 0), |best, cur| if cur.0 > best.0 { cur } else { best });
      let score = sigmoid(max_logit);
      if score < threshold {
        continue;
      }

      let grid_x = w as f32 + 0.5;
      let grid_y = h as f32 + 0.5;
      let x1 = ((grid_x - reg[idx]) * stride).clamp(0.0, input);
      let y1 = ((grid_y - reg[spatial + idx]) * stride).clamp(0.0, input);
      let x2 = ((grid_x + reg[2 * spatial + idx]) * stride).clamp(0.0, input);
      let y2 = ((grid_y + reg[3 * spatial + idx]) * stride).clamp(0.0, input);

      emit([x1, y1, x2, y2], score, class_id);
    }
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tensors_are_matched_by_size() {
    let reg = vec![0.0; 4 * 4];
    let cls = vec![0.0; YOLO26_CLASS_NUM * 4];
    let (r, c) = match_reg_cls_tensors(&cls, &reg, 4).unwrap();
    assert_eq!(r.len(), 16);
    assert_eq!(c.len(), YOLO26_CLASS_NUM * 4);
    assert!(match_reg_cls_tensors(&reg, &reg, 4).is_none());
  }

  #[test]
  fn decode_emits_cells_above_threshold() {
    let map = 2;
    let spatial = map * map;
    let reg = vec![0.5; 4 * spatial];
    let mut cls = vec![-10.0; YOLO26_CLASS_NUM * spatial];
    // 第 3 个格子的第 15 类置信度很高
    cls[15 * spatial + 3] = 10.0;

    let mut found = Vec::new();
    decode_head(&reg, &cls, map, 32.0, 64.0, 0.5, &mut |bbox, score, class_id| {
      found.push((bbox, score, class_id))
    });

    assert_eq!(found.len(), 1);
    let (bbox, score, class_id) = found[0];
    assert_eq!(class_id, 15);
    assert!(score > 0.99);
    assert_eq!(bbox, [32.0, 32.0, 64.0, 64.0]);
  }
}
