// 该文件是 Shanan （山南西风） 项目的一部分。
// src/feed.rs - 喂帧任务
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
  sync::Arc,
  thread::{self, JoinHandle},
  time::Duration,
};

use tracing::{info, warn};

use crate::{engine::Engine, frame::Frame, model::ModelLoader, signal::Signal};

const FEED_THREAD_NAME: &str = "shanan-feed";
const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 喂帧任务结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedExit {
  /// 帧源结束
  EndOfStream,
  /// 收到停止信号
  Stopped,
  /// 达到指定帧数
  FrameLimit,
  /// 推理线程已退出，继续提交没有意义
  WorkerDead,
}

/// 从帧源取帧并提交给引擎。
///
/// 等待引擎就绪后开始；`resume` 被清除时暂停提交。
#[derive(Debug)]
pub struct Feeder {
  stop: Arc<Signal>,
  resume: Arc<Signal>,
  interval: Duration,
  frame_number: Option<usize>,
}

impl Feeder {
  pub fn new(stop: Arc<Signal>) -> Self {
    Self {
      stop,
      resume: Arc::new(Signal::new_set()),
      interval: DEFAULT_INTERVAL,
      frame_number: None,
    }
  }

  pub fn with_resume(mut self, resume: Arc<Signal>) -> Self {
    self.resume = resume;
    self
  }

  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn run<I, L>(&self, input: I, engine: &Engine<L>) -> FeedExit
  where
    I: IntoIterator<Item = Frame>,
    L: ModelLoader,
  {
    let ready = engine.ready();
    while !ready.wait_timeout(POLL_INTERVAL) {
      if self.stop.is_set() {
        return FeedExit::Stopped;
      }
    }
    info!("引擎已就绪，开始提交帧");

    let mut submitted = 0usize;
    for frame in input {
      if !self.wait_resumed() {
        return FeedExit::Stopped;
      }
      if !engine.is_worker_alive() {
        warn!("推理线程已退出，停止提交帧");
        return FeedExit::WorkerDead;
      }

      engine.submit_frame(frame);
      submitted += 1;

      if self.frame_number.is_some_and(|n| submitted >= n) {
        info!("达到指定帧数 {}, 退出喂帧任务", submitted);
        return FeedExit::FrameLimit;
      }
      if self.stop.wait_timeout(self.interval) {
        return FeedExit::Stopped;
      }
    }

    info!("帧源结束，共提交 {} 帧", submitted);
    FeedExit::EndOfStream
  }

  /// 在独立线程中运行。
  pub fn spawn<I, L>(self, input: I, engine: Arc<Engine<L>>) -> std::io::Result<JoinHandle<FeedExit>>
  where
    I: IntoIterator<Item = Frame> + Send + 'static,
    L: ModelLoader,
  {
    thread::Builder::new()
      .name(FEED_THREAD_NAME.to_string())
      .spawn(move || self.run(input, &engine))
  }

  /// 暂停时阻塞，返回 `false` 表示期间收到了停止信号。
  fn wait_resumed(&self) -> bool {
    loop {
      if self.stop.is_set() {
        return false;
      }
      if self.resume.wait_timeout(POLL_INTERVAL) {
        return !self.stop.is_set();
      }
    }
  }
}
