// 该文件是 Shanan （山南西风） 项目的一部分。
// src/outcome.rs - 单次处理结果
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

use crate::{frame::Frame, model::DetectionResult};

/// 推理线程内部的错误，最终都会变成 [`Outcome::Failure`]。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
  /// 对当前推理线程是致命的，投递一次后线程退出。
  #[error("Failed to load model: {0}")]
  ModelLoad(String),
  /// 只影响本帧，线程继续处理后续帧。
  #[error("Failed to process frame: {0}")]
  FrameProcess(String),
}

/// 每个处理周期产生且只产生一个结果。
#[derive(Debug, Clone)]
pub enum Outcome {
  Success {
    frame: Frame,
    detections: Vec<DetectionResult>,
  },
  Failure(String),
}

impl Outcome {
  pub fn is_success(&self) -> bool {
    matches!(self, Outcome::Success { .. })
  }

  pub fn is_failure(&self) -> bool {
    matches!(self, Outcome::Failure(_))
  }

  pub fn detections(&self) -> Option<&[DetectionResult]> {
    match self {
      Outcome::Success { detections, .. } => Some(detections),
      Outcome::Failure(_) => None,
    }
  }

  pub fn failure_message(&self) -> Option<&str> {
    match self {
      Outcome::Success { .. } => None,
      Outcome::Failure(message) => Some(message),
    }
  }
}

impl From<WorkerError> for Outcome {
  fn from(err: WorkerError) -> Self {
    Outcome::Failure(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn worker_errors_render_as_failure_messages() {
    let load = Outcome::from(WorkerError::ModelLoad("no such file".into()));
    assert_eq!(
      load.failure_message(),
      Some("Failed to load model: no such file")
    );

    let process = Outcome::from(WorkerError::FrameProcess("bad tensor".into()));
    assert!(process.is_failure());
    assert_eq!(
      process.failure_message(),
      Some("Failed to process frame: bad tensor")
    );
    assert!(process.detections().is_none());
  }

  #[test]
  fn success_exposes_detections() {
    let outcome = Outcome::Success {
      frame: Frame::blank(1, 1, 3).unwrap(),
      detections: Vec::new(),
    };
    assert!(outcome.is_success());
    assert_eq!(outcome.detections().map(<[_]>::len), Some(0));
  }
}
