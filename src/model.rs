// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::frame::Frame;

/// 模型原始输出的一行：`[x1, y1, x2, y2, confidence, class_id]`，像素坐标。
pub type RawDetection = Vec<f32>;

pub const RAW_DETECTION_FIELDS: usize = 6;

pub const UNKNOWN_CLASS_NAME: &str = "Unknown";

/// 每次推理的参数，来自 [`crate::config::EngineConfig`]。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferParams {
  pub confidence_threshold: f32,
  pub image_size: u32,
}

/// 已加载的模型实例。只在推理线程内创建和使用。
pub trait Model {
  type Error: std::fmt::Display;

  fn infer(&mut self, frame: &Frame, params: &InferParams)
  -> Result<Vec<RawDetection>, Self::Error>;

  fn class_name(&self, class_id: u32) -> Option<&str>;
}

/// 从路径加载模型。加载器本身会被移交给推理线程。
pub trait ModelLoader: Send + Sync + 'static {
  type Model: Model;
  type Error: std::fmt::Display;

  fn load(&self, path: &Path) -> Result<Self::Model, Self::Error>;
}

/// 单个检测到的目标。
///
/// 模型不保证 `x1 <= x2`、`y1 <= y2`，使用方不能假设坐标有序。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
  #[serde(rename = "box")]
  pub bbox: [f32; 4], // [x1, y1, x2, y2]
  pub class_id: u32,
  pub class_name: String,
  pub confidence: f32,
}

impl DetectionResult {
  /// 坐标按 min/max 归一后的框 `[x_min, y_min, x_max, y_max]`。
  pub fn ordered_bbox(&self) -> [f32; 4] {
    let [x1, y1, x2, y2] = self.bbox;
    [x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)]
  }
}

/// 将原始输出行转换为检测结果，格式不对的行直接丢弃。
pub fn convert_rows<M: Model + ?Sized>(model: &M, rows: &[RawDetection]) -> Vec<DetectionResult> {
  rows
    .iter()
    .filter_map(|row| {
      let detection = convert_row(model, row);
      if detection.is_none() {
        trace!("丢弃格式错误的检测行: {:?}", row);
      }
      detection
    })
    .collect()
}

fn convert_row<M: Model + ?Sized>(model: &M, row: &[f32]) -> Option<DetectionResult> {
  let &[x1, y1, x2, y2, confidence, class] = row else {
    return None;
  };

  if !class.is_finite() || class < 0.0 {
    return None;
  }

  let class_id = class as u32;
  let class_name = model
    .class_name(class_id)
    .unwrap_or(UNKNOWN_CLASS_NAME)
    .to_string();

  Some(DetectionResult {
    bbox: [x1, y1, x2, y2],
    class_id,
    class_name,
    confidence,
  })
}

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[cfg(feature = "model_yolo26")]
mod yolo26;
#[cfg(feature = "model_yolo26")]
pub use self::yolo26::{Yolo26, Yolo26Error, Yolo26Loader};
