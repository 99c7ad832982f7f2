// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/common/mod.rs - 集成测试共用的脚本化模型
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

#![allow(dead_code)]

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  thread,
  time::Duration,
};

use parking_lot::Mutex;
use shanan_scope::{
  bridge::{OutcomeReceiver, outcome_channel},
  config::EngineConfig,
  engine::Engine,
  frame::Frame,
  model::{InferParams, Model, ModelLoader, RawDetection},
  outcome::Outcome,
};

/// 预热帧的边长，测试帧都比它小，用来区分两者。
pub const WARMUP_SIZE: u32 = 8;

/// 首字节为该值的帧会让模型返回错误。
pub const CORRUPT: u8 = 0xEE;

/// 测试帧：2x2 单通道，首字节为序号。
pub fn numbered(seq: u8) -> Frame {
  Frame::new(2, 2, 1, vec![seq, 0, 0, 0]).unwrap()
}

pub fn seq_of(outcome: &Outcome) -> Option<u8> {
  match outcome {
    Outcome::Success { frame, .. } => frame.as_hwc().first().copied(),
    Outcome::Failure(_) => None,
  }
}

/// 模型调用的观测数据，在测试线程和推理线程之间共享。
#[derive(Default)]
pub struct Probe {
  pub in_flight: AtomicUsize,
  pub max_in_flight: AtomicUsize,
  pub loads: AtomicUsize,
  /// 已开始推理的测试帧数（不含预热）
  pub started: AtomicUsize,
  pub seen: Mutex<Vec<u8>>,
}

#[derive(Clone)]
pub struct ScriptedLoader {
  pub fail_load: Option<String>,
  pub delay: Duration,
  pub rows: Vec<RawDetection>,
  pub probe: Arc<Probe>,
}

impl Default for ScriptedLoader {
  fn default() -> Self {
    Self {
      fail_load: None,
      delay: Duration::ZERO,
      rows: Vec::new(),
      probe: Arc::new(Probe::default()),
    }
  }
}

impl ScriptedLoader {
  pub fn failing(message: &str) -> Self {
    Self {
      fail_load: Some(message.to_string()),
      ..Self::default()
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn with_rows(mut self, rows: Vec<RawDetection>) -> Self {
    self.rows = rows;
    self
  }
}

pub struct ScriptedModel {
  delay: Duration,
  rows: Vec<RawDetection>,
  probe: Arc<Probe>,
}

impl ModelLoader for ScriptedLoader {
  type Model = ScriptedModel;
  type Error = String;

  fn load(&self, path: &Path) -> Result<ScriptedModel, String> {
    self.probe.loads.fetch_add(1, Ordering::SeqCst);
    if let Some(message) = &self.fail_load {
      return Err(format!("{}: {}", path.display(), message));
    }
    Ok(ScriptedModel {
      delay: self.delay,
      rows: self.rows.clone(),
      probe: self.probe.clone(),
    })
  }
}

impl Model for ScriptedModel {
  type Error = String;

  fn infer(&mut self, frame: &Frame, _: &InferParams) -> Result<Vec<RawDetection>, String> {
    let warmup = frame.width() == WARMUP_SIZE as usize;
    if !warmup {
      self.probe.started.fetch_add(1, Ordering::SeqCst);
    }
    let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
    thread::sleep(self.delay);
    self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);

    if warmup {
      return Ok(Vec::new());
    }
    let seq = frame.as_hwc().first().copied().unwrap_or_default();
    self.probe.seen.lock().push(seq);
    if seq == CORRUPT {
      return Err("corrupt frame".into());
    }
    Ok(self.rows.clone())
  }

  fn class_name(&self, class_id: u32) -> Option<&str> {
    (class_id == 2).then_some("cat")
  }
}

pub fn config(image_size: u32) -> EngineConfig {
  EngineConfig::new("models/scripted.rknn", 0.5, image_size).unwrap()
}

pub fn engine(loader: ScriptedLoader) -> (Engine<ScriptedLoader>, OutcomeReceiver) {
  let (tx, rx) = outcome_channel();
  (Engine::new(config(WARMUP_SIZE), loader, tx), rx)
}

/// 等待下一个结果，超时返回 `None`。
pub async fn next_outcome(rx: &mut OutcomeReceiver, timeout: Duration) -> Option<Outcome> {
  tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
}

/// 轮询 `cond` 直到成立或超时。
pub async fn eventually(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
  let deadline = tokio::time::Instant::now() + timeout;
  while tokio::time::Instant::now() < deadline {
    if cond() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  cond()
}
