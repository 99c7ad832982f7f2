// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 推理引擎配置
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, model::InferParams};

pub const DEFAULT_MODEL_PATH: &str = "models/yolo26.rknn";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IMAGE_SIZE: u32 = 320;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须在 0.0 到 1.0 之间: {0}")]
  ConfidenceOutOfRange(f32),
  #[error("输入尺寸必须大于 0")]
  ZeroImageSize,
  #[error("参数 {key} 的值无效: {value}")]
  InvalidParameter { key: String, value: String },
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 推理引擎的不可变配置快照，推理线程启动时读取一次。
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
  model_path: PathBuf,
  confidence_threshold: f32,
  image_size: u32,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      model_path: PathBuf::from(DEFAULT_MODEL_PATH),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      image_size: DEFAULT_IMAGE_SIZE,
    }
  }
}

impl EngineConfig {
  pub fn new(
    model_path: impl Into<PathBuf>,
    confidence_threshold: f32,
    image_size: u32,
  ) -> Result<Self, ConfigError> {
    Self::default()
      .with_model_path(model_path)
      .with_confidence_threshold(confidence_threshold)?
      .with_image_size(image_size)
  }

  pub fn with_model_path(mut self, model_path: impl Into<PathBuf>) -> Self {
    self.model_path = model_path.into();
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Result<Self, ConfigError> {
    if !(0.0..=1.0).contains(&threshold) {
      return Err(ConfigError::ConfidenceOutOfRange(threshold));
    }
    self.confidence_threshold = threshold;
    Ok(self)
  }

  pub fn with_image_size(mut self, image_size: u32) -> Result<Self, ConfigError> {
    if image_size == 0 {
      return Err(ConfigError::ZeroImageSize);
    }
    self.image_size = image_size;
    Ok(self)
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn image_size(&self) -> u32 {
    self.image_size
  }

  pub fn infer_params(&self) -> InferParams {
    InferParams {
      confidence_threshold: self.confidence_threshold,
      image_size: self.image_size,
    }
  }
}

impl FromUrlWithScheme for EngineConfig {
  const SCHEME: &'static str = "model";
}

/// `model:///path/to/model.rknn?confidence=0.4&size=640`
impl FromUrl for EngineConfig {
  type Error = ConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConfigError::SchemeMismatch);
    }

    let mut config = Self::default();
    if !url.path().is_empty() {
      let path = urlencoding::decode(url.path()).map_err(|_| ConfigError::InvalidParameter {
        key: "path".to_string(),
        value: url.path().to_string(),
      })?;
      config = config.with_model_path(path.into_owned());
    }

    for (key, value) in url.query_pairs() {
      let invalid = || ConfigError::InvalidParameter {
        key: key.to_string(),
        value: value.to_string(),
      };
      match &*key {
        "confidence" => {
          let threshold = value.parse::<f32>().map_err(|_| invalid())?;
          config = config.with_confidence_threshold(threshold)?;
        }
        "size" => {
          let size = value.parse::<u32>().map_err(|_| invalid())?;
          config = config.with_image_size(size)?;
        }
        _ => {}
      }
    }

    Ok(config)
  }
}
