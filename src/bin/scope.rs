// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/scope.rs - 实时检测命令行程序
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

use std::{path::PathBuf, sync::Arc, thread, time::Duration};

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use shanan_scope::{
  FromUrl,
  bridge::outcome_channel,
  config::EngineConfig,
  engine::Engine,
  feed::{FeedExit, Feeder},
  input::InputWrapper,
  model::Yolo26Loader,
  monitor::Monitor,
  signal::Signal,
};

/// 实时检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型，例如 model:///models/yolo26.rknn?confidence=0.5&size=320
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///tmp/a.png?repeat 或 v4l:///dev/video0
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 退出时保存最后一帧检测结果的目录
  #[arg(long, value_name = "DIR")]
  pub snapshot_dir: Option<PathBuf>,
  /// 结果轮询间隔（毫秒）
  #[arg(long, default_value = "33", value_name = "MS")]
  pub tick_ms: u64,
  /// 喂帧间隔（毫秒）
  #[arg(long, default_value = "10", value_name = "MS")]
  pub feed_interval_ms: u64,
  /// 最大提交帧数
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<usize>,
  /// 帧源结束后继续等待结果的时间（毫秒）
  #[arg(long, default_value = "1000", value_name = "MS")]
  pub linger_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);

  let config = EngineConfig::from_url(&args.model)?;
  let input = InputWrapper::from_url(&args.input)?;

  let (tx, mut rx) = outcome_channel();
  let engine = Arc::new(Engine::new(config, Yolo26Loader::default(), tx));
  engine.start()?;

  let stop = Arc::new(Signal::new());
  {
    let stop = stop.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      stop.set();
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
  }

  let feeder = Feeder::new(stop.clone())
    .with_interval(Duration::from_millis(args.feed_interval_ms))
    .with_frame_number(args.max_frames)
    .spawn(input, engine.clone())?;

  let linger = Duration::from_millis(args.linger_ms);
  let watcher = {
    let stop = stop.clone();
    tokio::spawn(async move {
      let exit = tokio::task::spawn_blocking(move || feeder.join())
        .await
        .map_err(|e| anyhow!("喂帧任务异常: {}", e))?
        .map_err(|_| anyhow!("喂帧线程 panic"))?;
      info!("喂帧任务结束: {:?}", exit);
      if exit != FeedExit::Stopped {
        tokio::time::sleep(linger).await;
        stop.set();
      }
      Ok::<_, anyhow::Error>(exit)
    })
  };

  let mut monitor = Monitor::new();
  monitor
    .run(&mut rx, stop.clone(), Duration::from_millis(args.tick_ms))
    .await;

  engine.stop();
  // 推理线程已退出，收走停止前已投递的结果
  monitor.poll(&mut rx);
  watcher.await??;

  if let Some(fps) = monitor.fps() {
    info!("结果速率: {:.1} fps", fps);
  }
  for (name, count) in monitor.class_counts() {
    info!("  {}: {}", name, count);
  }

  if let Some(dir) = args.snapshot_dir {
    save_snapshot(&monitor, dir);
  }

  info!("任务完成，退出");
  Ok(())
}

#[cfg(feature = "save_image_file")]
fn save_snapshot(monitor: &Monitor, dir: PathBuf) {
  let writer = shanan_scope::output::SnapshotWriter::new(dir);
  match monitor.save_snapshot(&writer) {
    Ok(path) => info!("快照已保存: {}", path.display()),
    Err(e) => warn!("未保存快照: {}", e),
  }
}

#[cfg(not(feature = "save_image_file"))]
fn save_snapshot(_: &Monitor, dir: PathBuf) {
  warn!(
    "未启用 save_image_file 特性，忽略快照目录 {}",
    dir.display()
  );
}
