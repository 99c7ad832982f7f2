// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/v4l_input.rs - V4L 摄像头输入
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

use thiserror::Error;
use tracing::{error, info};
use url::Url;
use v4l::{FourCC, io::traits::CaptureStream, video::Capture};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, RGB_CHANNELS},
};

const DEFAULT_DEVICE: &str = "/dev/video0";
const CAPTURE_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("V4L error: {0}")]
  V4lError(#[from] std::io::Error),
  #[error("Unsupported pixel format: {0}")]
  UnsupportedPixelFormat(String),
}

/// V4L2 摄像头帧源，要求设备支持 RGB24 (`RGB3`) 输出。
///
/// 采集失败或设备断开时迭代结束。
pub struct V4lInput {
  device: v4l::Device,
  width: usize,
  height: usize,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

/// `v4l:///dev/video0`
impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemaMismatch);
    }

    let device_path = if url.path().is_empty() || url.path() == "/" {
      DEFAULT_DEVICE
    } else {
      url.path()
    };
    Self::open(device_path)
  }
}

impl V4lInput {
  pub fn open(device_path: &str) -> Result<Self, V4lInputError> {
    let device = v4l::Device::with_path(device_path)?;

    let mut format = device.format()?;
    format.fourcc = FourCC::new(b"RGB3");
    let format = device.set_format(&format)?;
    if format.fourcc != FourCC::new(b"RGB3") {
      return Err(V4lInputError::UnsupportedPixelFormat(format.fourcc.to_string()));
    }

    info!(
      "摄像头已打开: {} ({}x{})",
      device_path, format.width, format.height
    );
    Ok(V4lInput {
      device,
      width: format.width as usize,
      height: format.height as usize,
    })
  }

  pub fn into_frames(self) -> V4lFrames {
    V4lFrames { inner: self }
  }

  fn capture_frame(&self) -> Result<Frame, V4lInputError> {
    let mut stream = v4l::io::mmap::Stream::with_buffers(
      &self.device,
      v4l::buffer::Type::VideoCapture,
      CAPTURE_BUFFERS,
    )?;
    let (buf, _meta) = stream.next()?;

    let size = self.height * self.width * RGB_CHANNELS;
    if buf.len() < size {
      return Err(V4lInputError::UnsupportedPixelFormat(format!(
        "缓冲区过小: {} < {}",
        buf.len(),
        size
      )));
    }

    Frame::new(self.height, self.width, RGB_CHANNELS, buf[..size].to_vec())
      .map_err(|e| V4lInputError::UnsupportedPixelFormat(e.to_string()))
  }
}

pub struct V4lFrames {
  inner: V4lInput,
}

impl Iterator for V4lFrames {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self.inner.capture_frame() {
      Ok(frame) => Some(frame),
      Err(e) => {
        error!("Failed to capture frame: {}", e);
        None
      }
    }
  }
}
