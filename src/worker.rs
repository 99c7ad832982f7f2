// 该文件是 Shanan （山南西风） 项目的一部分。
// src/worker.rs - 推理线程
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

use std::{
  any::Any,
  panic::{self, AssertUnwindSafe},
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::{Duration, Instant},
};

use tracing::{debug, error, info};

use crate::{
  bridge::ResultBridge,
  config::EngineConfig,
  frame::{Frame, RGB_CHANNELS},
  mailbox::Mailbox,
  model::{Model, ModelLoader, convert_rows},
  outcome::{Outcome, WorkerError},
  signal::Signal,
};

/// 信箱为空时的等待时长，同时也是 `stop()` 延迟的上界之一。
pub(crate) const IDLE_WAIT: Duration = Duration::from_millis(10);

/// 一个推理线程实例。模型在线程内加载，从不离开该线程。
pub(crate) struct Worker<L> {
  pub(crate) config: Arc<EngineConfig>,
  pub(crate) loader: Arc<L>,
  pub(crate) mailbox: Arc<Mailbox>,
  pub(crate) bridge: ResultBridge,
  pub(crate) stop: Arc<Signal>,
  pub(crate) alive: Arc<AtomicBool>,
}

/// 线程退出（包括 panic）时清除存活标志。
struct AliveGuard(Arc<AtomicBool>);

impl Drop for AliveGuard {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

impl<L: ModelLoader> Worker<L> {
  pub(crate) fn run(self) {
    let _alive = AliveGuard(self.alive.clone());
    info!("推理线程启动");

    let mut model = match self.prepare() {
      Ok(model) => model,
      Err(e) => {
        error!("{}", e);
        self.bridge.deliver(e.into());
        info!("推理线程因模型加载失败退出");
        return;
      }
    };

    while !self.stop.is_set() {
      match self.mailbox.take() {
        Some(frame) => {
          let outcome = self.process(&mut model, frame);
          self.bridge.deliver(outcome);
        }
        None => {
          self.stop.wait_timeout(IDLE_WAIT);
        }
      }
    }

    info!("推理线程退出");
  }

  /// 加载模型并做一次预热推理，预热失败按加载失败处理。
  fn prepare(&self) -> Result<L::Model, WorkerError> {
    let path = self.config.model_path();
    let mut model = guarded(|| self.loader.load(path))
      .and_then(|r| r.map_err(|e| e.to_string()))
      .map_err(WorkerError::ModelLoad)?;

    let size = self.config.image_size() as usize;
    let params = self.config.infer_params();
    let now = Instant::now();
    guarded(|| {
      let blank = Frame::blank(size, size, RGB_CHANNELS).map_err(|e| e.to_string())?;
      model.infer(&blank, &params).map(drop).map_err(|e| e.to_string())
    })
    .and_then(|r| r)
    .map_err(|e| WorkerError::ModelLoad(format!("warm-up inference failed: {}", e)))?;
    info!("模型预热完成，耗时: {:.2?}", now.elapsed());

    Ok(model)
  }

  fn process(&self, model: &mut L::Model, frame: Frame) -> Outcome {
    let params = self.config.infer_params();
    let now = Instant::now();
    let rows = guarded(|| model.infer(&frame, &params))
      .and_then(|r| r.map_err(|e| e.to_string()));

    match rows {
      Ok(rows) => {
        let detections = convert_rows(&*model, &rows);
        debug!(
          "推理完成，耗时: {:.2?}，检测到 {} 个目标",
          now.elapsed(),
          detections.len()
        );
        Outcome::Success { frame, detections }
      }
      Err(e) => {
        let err = WorkerError::FrameProcess(e);
        error!("{}", err);
        err.into()
      }
    }
  }
}

/// 执行模型调用，把 panic 转换为错误信息。
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
  panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    format!("panic: {}", s)
  } else if let Some(s) = payload.downcast_ref::<String>() {
    format!("panic: {}", s)
  } else {
    "panic".to_string()
  }
}
