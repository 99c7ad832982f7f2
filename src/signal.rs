// 该文件是 Shanan （山南西风） 项目的一部分。
// src/signal.rs - 线程间事件信号
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

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// 可置位、可清除的事件。等待方在置位时被唤醒。
///
/// 停止标志、就绪信号以及暂停/恢复闸门都使用它。
#[derive(Debug, Default)]
pub struct Signal {
  flag: Mutex<bool>,
  cond: Condvar,
}

impl Signal {
  pub fn new() -> Self {
    Self::default()
  }

  /// 初始即为置位状态。
  pub fn new_set() -> Self {
    Self {
      flag: Mutex::new(true),
      cond: Condvar::new(),
    }
  }

  pub fn set(&self) {
    let mut flag = self.flag.lock();
    *flag = true;
    self.cond.notify_all();
  }

  pub fn clear(&self) {
    *self.flag.lock() = false;
  }

  pub fn is_set(&self) -> bool {
    *self.flag.lock()
  }

  /// 阻塞直到置位。
  pub fn wait(&self) {
    let mut flag = self.flag.lock();
    while !*flag {
      self.cond.wait(&mut flag);
    }
  }

  /// 最多等待 `timeout`，返回等待结束时是否已置位。
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut flag = self.flag.lock();
    while !*flag {
      if self.cond.wait_until(&mut flag, deadline).timed_out() {
        break;
      }
    }
    *flag
  }
}
