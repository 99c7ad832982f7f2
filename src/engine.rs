// 该文件是 Shanan （山南西风） 项目的一部分。
// src/engine.rs - 推理引擎生命周期
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread::{self, JoinHandle},
  time::Duration,
};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::{runtime::Handle, sync::oneshot};
use tracing::{debug, error, info};

use crate::{
  bridge::{OutcomeSender, ResultBridge},
  config::EngineConfig,
  frame::Frame,
  mailbox::Mailbox,
  model::ModelLoader,
  signal::Signal,
  worker::Worker,
};

const WORKER_THREAD_NAME: &str = "shanan-inference";

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("start() 必须在运行中的 Tokio 运行时内调用")]
  NotReady,
  #[error("无法创建推理线程: {0}")]
  Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
  NotStarted,
  Running,
  Stopping,
  Stopped,
}

struct WorkerHandle {
  stop: Arc<Signal>,
  thread: JoinHandle<()>,
}

#[derive(Default)]
struct Lifecycle {
  worker: Option<WorkerHandle>,
  /// 发送端一侧。接收端由运行在消费者运行时上的任务持有，
  /// 运行时关闭时该任务被释放，`is_closed()` 随之变为 `true`。
  consumer: Option<oneshot::Sender<()>>,
}

/// 推理引擎。
///
/// 持有单槽信箱和至多一个推理线程。所有方法都只需要 `&self`，
/// 可以放进 `Arc` 在喂帧线程和消费者之间共享。
pub struct Engine<L: ModelLoader> {
  config: Arc<EngineConfig>,
  loader: Arc<L>,
  mailbox: Arc<Mailbox>,
  bridge: ResultBridge,
  ready: Arc<Signal>,
  alive: Arc<AtomicBool>,
  state: Mutex<EngineState>,
  lifecycle: Mutex<Lifecycle>,
}

impl<L: ModelLoader> Engine<L> {
  pub fn new(config: EngineConfig, loader: L, sender: OutcomeSender) -> Self {
    Self {
      config: Arc::new(config),
      loader: Arc::new(loader),
      mailbox: Arc::new(Mailbox::new()),
      bridge: ResultBridge::new(sender),
      ready: Arc::new(Signal::new()),
      alive: Arc::new(AtomicBool::new(false)),
      state: Mutex::new(EngineState::NotStarted),
      lifecycle: Mutex::default(),
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn state(&self) -> EngineState {
    *self.state.lock()
  }

  /// 启动推理线程。
  ///
  /// 必须在 Tokio 运行时上下文中调用，结果会投递到该运行时的消费者。
  /// 已在运行时直接返回。
  pub fn start(&self) -> Result<(), EngineError> {
    let mut lifecycle = self.lifecycle.lock();
    if self.state() == EngineState::Running {
      return Ok(());
    }

    let consumer = Handle::try_current().map_err(|_| EngineError::NotReady)?;
    debug!("消费者运行时: {:?}", consumer.runtime_flavor());

    let stop = Arc::new(Signal::new());
    let worker = Worker {
      config: self.config.clone(),
      loader: self.loader.clone(),
      mailbox: self.mailbox.clone(),
      bridge: self.bridge.clone(),
      stop: stop.clone(),
      alive: self.alive.clone(),
    };

    self.alive.store(true, Ordering::Release);
    let thread = match thread::Builder::new()
      .name(WORKER_THREAD_NAME.to_string())
      .spawn(move || worker.run())
    {
      Ok(thread) => thread,
      Err(e) => {
        self.alive.store(false, Ordering::Release);
        error!("无法创建推理线程: {}", e);
        return Err(e.into());
      }
    };

    let (consumer_tx, consumer_rx) = oneshot::channel::<()>();
    consumer.spawn(async move {
      let _ = consumer_rx.await;
    });

    lifecycle.worker = Some(WorkerHandle { stop, thread });
    lifecycle.consumer = Some(consumer_tx);
    *self.state.lock() = EngineState::Running;
    self.ready.set();
    info!("推理引擎已启动");
    Ok(())
  }

  /// 通知推理线程停止并等待其完全退出。可重复调用，可在任意线程调用。
  pub fn stop(&self) {
    let mut lifecycle = self.lifecycle.lock();
    if let Some(worker) = lifecycle.worker.take() {
      *self.state.lock() = EngineState::Stopping;
      self.ready.clear();
      worker.stop.set();
      if worker.thread.join().is_err() {
        error!("推理线程异常退出");
      }
      info!("推理引擎已停止");
    }
    lifecycle.consumer = None;
    *self.state.lock() = EngineState::Stopped;
  }

  /// 提交一帧。从不阻塞，总是接受；覆盖尚未处理的旧帧。
  pub fn submit_frame(&self, frame: Frame) {
    self.mailbox.put(frame);
  }

  /// `start()` 成功后置位，`stop()` 时清除。
  pub fn ready(&self) -> Arc<Signal> {
    self.ready.clone()
  }

  pub fn wait_ready(&self, timeout: Duration) -> bool {
    self.ready.wait_timeout(timeout)
  }

  /// 是否已关联消费者运行时：运行时尚未关闭，且消费端仍在接收结果。
  pub fn is_consumer_active(&self) -> bool {
    let runtime_alive = self
      .lifecycle
      .lock()
      .consumer
      .as_ref()
      .is_some_and(|tx| !tx.is_closed());
    runtime_alive && self.bridge.is_connected()
  }

  /// 推理线程是否仍在执行。模型加载失败后会变为 `false`，
  /// 此时状态仍为 `Running`，需要 `stop()` 后重新 `start()`。
  pub fn is_worker_alive(&self) -> bool {
    self.alive.load(Ordering::Acquire)
  }
}

impl<L: ModelLoader> Drop for Engine<L> {
  fn drop(&mut self) {
    self.stop();
  }
}
