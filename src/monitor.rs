// 该文件是 Shanan （山南西风） 项目的一部分。
// src/monitor.rs - 结果消费循环
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
  collections::{BTreeMap, VecDeque},
  sync::Arc,
  time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{error, info};

use crate::{
  bridge::OutcomeReceiver, frame::Frame, model::DetectionResult, outcome::Outcome, signal::Signal,
};

pub const DEFAULT_TICK: Duration = Duration::from_micros(33_333);
const FPS_WINDOW: usize = 20;

#[derive(Error, Debug)]
pub enum MonitorError {
  #[error("没有可保存的帧")]
  NoFrame,
  #[cfg(feature = "save_image_file")]
  #[error("保存快照失败: {0}")]
  Snapshot(#[from] crate::output::SnapshotError),
}

/// 处理单个结果后的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
  /// 检测摘要发生变化
  Detections(String),
  /// 成功但摘要与上次相同，或没有检测到目标
  Quiet,
  /// 推理失败
  Failure(String),
}

/// 消费者一侧的参考实现：按节拍轮询结果通道并维护最新状态。
#[derive(Debug, Default)]
pub struct Monitor {
  latest: Option<(Frame, Vec<DetectionResult>)>,
  arrivals: VecDeque<Instant>,
  last_summary: Option<String>,
  successes: u64,
  failures: u64,
}

impl Monitor {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn handle(&mut self, outcome: Outcome) -> MonitorEvent {
    match outcome {
      Outcome::Success { frame, detections } => {
        self.successes += 1;
        if self.arrivals.len() == FPS_WINDOW {
          self.arrivals.pop_front();
        }
        self.arrivals.push_back(Instant::now());

        let event = match summarize(&detections) {
          Some(summary) if self.last_summary.as_ref() != Some(&summary) => {
            info!("{}", summary);
            self.last_summary = Some(summary.clone());
            MonitorEvent::Detections(summary)
          }
          _ => MonitorEvent::Quiet,
        };
        self.latest = Some((frame, detections));
        event
      }
      Outcome::Failure(message) => {
        self.failures += 1;
        error!("{}", message);
        MonitorEvent::Failure(message)
      }
    }
  }

  /// 非阻塞地处理当前已到达的所有结果，通道为空时什么也不做。
  pub fn poll(&mut self, receiver: &mut OutcomeReceiver) -> Vec<MonitorEvent> {
    std::iter::from_fn(|| receiver.try_poll())
      .map(|outcome| self.handle(outcome))
      .collect()
  }

  /// 按节拍轮询，直到 `stop` 置位。
  pub async fn run(&mut self, receiver: &mut OutcomeReceiver, stop: Arc<Signal>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    while !stop.is_set() {
      interval.tick().await;
      self.poll(receiver);
    }
    info!(
      "结果循环退出: 成功 {} 次, 失败 {} 次",
      self.successes, self.failures
    );
  }

  /// 最近 20 个成功结果的到达速率。
  pub fn fps(&self) -> Option<f64> {
    let first = self.arrivals.front()?;
    let last = self.arrivals.back()?;
    let delta = last.duration_since(*first).as_secs_f64();
    (self.arrivals.len() >= 2 && delta > 0.0).then(|| (self.arrivals.len() - 1) as f64 / delta)
  }

  pub fn latest(&self) -> Option<(&Frame, &[DetectionResult])> {
    self
      .latest
      .as_ref()
      .map(|(frame, detections)| (frame, detections.as_slice()))
  }

  /// 最新结果中各类别的数量。
  pub fn class_counts(&self) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for detection in self.latest().map(|(_, d)| d).unwrap_or_default() {
      *counts.entry(detection.class_name.clone()).or_insert(0) += 1;
    }
    counts
  }

  pub fn successes(&self) -> u64 {
    self.successes
  }

  pub fn failures(&self) -> u64 {
    self.failures
  }

  #[cfg(feature = "save_image_file")]
  pub fn save_snapshot(
    &self,
    writer: &crate::output::SnapshotWriter,
  ) -> Result<std::path::PathBuf, MonitorError> {
    let (frame, detections) = self.latest().ok_or(MonitorError::NoFrame)?;
    Ok(writer.save(frame, detections)?)
  }
}

fn summarize(detections: &[DetectionResult]) -> Option<String> {
  if detections.is_empty() {
    return None;
  }
  let items: Vec<String> = detections
    .iter()
    .map(|d| format!("{} ({:.2})", d.class_name, d.confidence))
    .collect();
  Some(format!(
    "Detected {} objects: {}",
    detections.len(),
    items.join(", ")
  ))
}
