// 该文件是 Shanan （山南西风） 项目的一部分。
// src/mailbox.rs - 单槽帧信箱
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

use parking_lot::Mutex;
use tracing::trace;

use crate::frame::Frame;

/// 最多保存一帧的信箱，新帧总是覆盖未取走的旧帧。
///
/// 锁只在交换 `Option` 时持有，推理期间不持锁。
#[derive(Debug, Default)]
pub struct Mailbox {
  slot: Mutex<Option<Frame>>,
}

impl Mailbox {
  pub fn new() -> Self {
    Self::default()
  }

  /// 放入一帧，丢弃尚未被取走的旧帧。
  pub fn put(&self, frame: Frame) {
    let previous = self.slot.lock().replace(frame);
    if previous.is_some() {
      trace!("信箱中的旧帧未被处理，已丢弃");
    }
  }

  /// 取出当前帧，信箱随之清空。
  pub fn take(&self) -> Option<Frame> {
    self.slot.lock().take()
  }

  pub fn is_empty(&self) -> bool {
    self.slot.lock().is_none()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn frame(tag: u8) -> Frame {
    Frame::new(1, 1, 1, vec![tag]).unwrap()
  }

  #[test]
  fn latest_put_wins() {
    let mailbox = Mailbox::new();
    mailbox.put(frame(1));
    mailbox.put(frame(2));

    let taken = mailbox.take().unwrap();
    assert_eq!(taken.as_hwc(), &[2]);
    assert!(mailbox.take().is_none());
  }

  #[test]
  fn take_on_empty_returns_none() {
    let mailbox = Mailbox::new();
    assert!(mailbox.is_empty());
    assert!(mailbox.take().is_none());
  }

  #[test]
  fn ten_rapid_puts_keep_only_the_tenth() {
    let mailbox = Mailbox::new();
    for tag in 1..=10 {
      mailbox.put(frame(tag));
    }
    assert_eq!(mailbox.take().unwrap().as_hwc(), &[10]);
    assert!(mailbox.is_empty());
  }
}
