// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - HWC 帧定义
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

use std::sync::Arc;

use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;

/// 单帧像素缓冲区的上限（1 GiB）。
pub const MAX_FRAME_BYTES: usize = 1 << 30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("帧尺寸无效: {height}x{width}x{channels}")]
  InvalidShape {
    height: usize,
    width: usize,
    channels: usize,
  },
  #[error("帧尺寸过大: {height}x{width}x{channels}")]
  TooLarge {
    height: usize,
    width: usize,
    channels: usize,
  },
  #[error("不支持的通道数: {0}")]
  UnsupportedChannels(usize),
}

/// 某一时刻采集的一帧图像，按 HWC 排列、每通道 8 位。
///
/// 像素缓冲区在克隆之间共享且只读，因此同一帧可以同时
/// 被信箱、推理线程和下游的结果持有而无需复制像素。
#[derive(Debug, Clone)]
pub struct Frame {
  data: Arc<[u8]>,
  height: usize,
  width: usize,
  channels: usize,
}

impl Frame {
  pub fn new(
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    let expected = buffer_len(height, width, channels)?;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into(),
      height,
      width,
      channels,
    })
  }

  /// 全零帧，用于模型预热。
  pub fn blank(height: usize, width: usize, channels: usize) -> Result<Self, FrameError> {
    let len = buffer_len(height, width, channels)?;
    Ok(Self {
      data: vec![0u8; len].into(),
      height,
      width,
      channels,
    })
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn shape(&self) -> (usize, usize, usize) {
    (self.height, self.width, self.channels)
  }

  pub fn as_hwc(&self) -> &[u8] {
    &self.data
  }

  /// 两个句柄是否指向同一块像素缓冲区。
  pub fn shares_buffer(&self, other: &Frame) -> bool {
    Arc::ptr_eq(&self.data, &other.data)
  }
}

/// 校验形状并计算缓冲区长度。
fn buffer_len(height: usize, width: usize, channels: usize) -> Result<usize, FrameError> {
  if height == 0 || width == 0 || channels == 0 {
    return Err(FrameError::InvalidShape {
      height,
      width,
      channels,
    });
  }
  height
    .checked_mul(width)
    .and_then(|n| n.checked_mul(channels))
    .filter(|&n| n <= MAX_FRAME_BYTES)
    .ok_or(FrameError::TooLarge {
      height,
      width,
      channels,
    })
}

impl AsRef<[u8]> for Frame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(feature = "image")]
impl From<image::RgbImage> for Frame {
  fn from(image: image::RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      data: image.into_raw().into(),
      height: height as usize,
      width: width as usize,
      channels: RGB_CHANNELS,
    }
  }
}

#[cfg(feature = "image")]
impl Frame {
  /// 转换为 RGB 图像。灰度帧展开为三通道，四通道帧丢弃 alpha。
  pub fn to_rgb_image(&self) -> Result<image::RgbImage, FrameError> {
    let pixels = self.height * self.width;
    let rgb: Vec<u8> = match self.channels {
      RGB_CHANNELS => self.data.to_vec(),
      1 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
      4 => self
        .data
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect(),
      other => return Err(FrameError::UnsupportedChannels(other)),
    };
    debug_assert_eq!(rgb.len(), pixels * RGB_CHANNELS);

    image::RgbImage::from_raw(self.width as u32, self.height as u32, rgb).ok_or(
      FrameError::LengthMismatch {
        expected: pixels * RGB_CHANNELS,
        actual: self.data.len(),
      },
    )
  }
}
