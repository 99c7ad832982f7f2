// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bridge.rs - 结果通道与跨线程投递
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

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::debug;

use crate::outcome::Outcome;

/// 创建无界、有序的结果通道。
pub fn outcome_channel() -> (OutcomeSender, OutcomeReceiver) {
  let (tx, rx) = mpsc::unbounded_channel();
  (OutcomeSender { tx }, OutcomeReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct OutcomeSender {
  tx: UnboundedSender<Outcome>,
}

impl OutcomeSender {
  /// 消费端是否仍然存在。
  pub fn is_connected(&self) -> bool {
    !self.tx.is_closed()
  }
}

/// 消费端。在自己的调度器上按节拍非阻塞地轮询。
#[derive(Debug)]
pub struct OutcomeReceiver {
  rx: UnboundedReceiver<Outcome>,
}

impl OutcomeReceiver {
  /// 非阻塞轮询，没有新结果时返回 `None`。
  pub fn try_poll(&mut self) -> Option<Outcome> {
    match self.rx.try_recv() {
      Ok(outcome) => Some(outcome),
      Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
    }
  }

  /// 异步等待下一个结果，所有发送端都释放后返回 `None`。
  pub async fn recv(&mut self) -> Option<Outcome> {
    self.rx.recv().await
  }
}

/// 把推理线程产生的结果投递到消费者的调度器。
///
/// 投递只是一次线程安全的入队，不等待消费者处理，也不会阻塞推理线程。
#[derive(Debug, Clone)]
pub struct ResultBridge {
  sender: OutcomeSender,
}

impl ResultBridge {
  pub fn new(sender: OutcomeSender) -> Self {
    Self { sender }
  }

  pub fn deliver(&self, outcome: Outcome) {
    if self.sender.tx.send(outcome).is_err() {
      debug!("结果通道的消费端已关闭，丢弃结果");
    }
  }

  pub fn is_connected(&self) -> bool {
    self.sender.is_connected()
  }
}
