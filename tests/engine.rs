// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/engine.rs - 推理引擎集成测试
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

mod common;

use std::{
  sync::{Arc, atomic::Ordering},
  thread,
  time::Duration,
};

use common::*;
use shanan_scope::{
  bridge::outcome_channel,
  engine::{Engine, EngineError, EngineState},
  frame::Frame,
  outcome::Outcome,
};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn detects_cat_in_submitted_frame() {
  let loader = ScriptedLoader::default().with_rows(vec![vec![10.0, 20.0, 110.0, 220.0, 0.9, 2.0]]);
  let (engine, mut rx) = engine(loader);
  engine.start().unwrap();

  let frame = Frame::blank(320, 320, 3).unwrap();
  engine.submit_frame(frame.clone());

  match next_outcome(&mut rx, WAIT).await {
    Some(Outcome::Success {
      frame: processed,
      detections,
    }) => {
      assert!(processed.shares_buffer(&frame));
      assert_eq!(detections.len(), 1);
      let cat = &detections[0];
      assert_eq!(cat.bbox, [10.0, 20.0, 110.0, 220.0]);
      assert_eq!(cat.class_id, 2);
      assert_eq!(cat.class_name, "cat");
      assert!((cat.confidence - 0.9).abs() < 1e-6);
    }
    other => panic!("unexpected outcome: {:?}", other),
  }

  engine.stop();
  assert_eq!(engine.state(), EngineState::Stopped);
}

#[tokio::test]
async fn rapid_submits_only_latest_is_processed() {
  let loader = ScriptedLoader::default();
  let probe = loader.probe.clone();
  let (engine, mut rx) = engine(loader);

  for seq in 1..=10 {
    engine.submit_frame(numbered(seq));
  }
  engine.start().unwrap();

  let outcome = next_outcome(&mut rx, WAIT).await.unwrap();
  assert_eq!(seq_of(&outcome), Some(10));

  tokio::time::sleep(Duration::from_millis(50)).await;
  engine.stop();
  assert!(rx.try_poll().is_none());
  assert_eq!(*probe.seen.lock(), vec![10]);
}

#[tokio::test]
async fn one_frame_in_flight_and_results_in_order() {
  let loader = ScriptedLoader::default().with_delay(Duration::from_millis(3));
  let probe = loader.probe.clone();
  let (engine, mut rx) = engine(loader);
  let engine = Arc::new(engine);
  engine.start().unwrap();
  assert!(engine.wait_ready(WAIT));

  let producer = {
    let engine = engine.clone();
    thread::spawn(move || {
      for seq in 1..=60 {
        engine.submit_frame(numbered(seq));
        thread::sleep(Duration::from_millis(1));
      }
    })
  };
  producer.join().unwrap();

  // 最后一帧一定会被处理
  let mut seqs = Vec::new();
  while seqs.last() != Some(&60) {
    let outcome = next_outcome(&mut rx, WAIT).await.expect("missing outcome");
    seqs.push(seq_of(&outcome).unwrap());
  }
  engine.stop();

  assert!(seqs.windows(2).all(|w| w[0] < w[1]), "out of order: {:?}", seqs);
  assert_eq!(*probe.seen.lock(), seqs);
  assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn no_outcome_after_stop_returns() {
  let loader = ScriptedLoader::default().with_delay(Duration::from_millis(40));
  let (engine, mut rx) = engine(loader);
  engine.start().unwrap();

  engine.submit_frame(numbered(1));
  tokio::time::sleep(Duration::from_millis(20)).await;
  engine.submit_frame(numbered(2));
  engine.stop();
  assert!(!engine.is_worker_alive());

  let mut delivered = Vec::new();
  while let Some(outcome) = rx.try_poll() {
    delivered.push(outcome);
  }
  assert!(delivered.len() <= 2);

  tokio::time::sleep(Duration::from_millis(120)).await;
  assert!(rx.try_poll().is_none());
}

#[tokio::test]
async fn fatal_load_reports_once_and_worker_dies() {
  let loader = ScriptedLoader::failing("no such file");
  let probe = loader.probe.clone();
  let (engine, mut rx) = engine(loader);
  engine.start().unwrap();

  let outcome = next_outcome(&mut rx, WAIT).await.unwrap();
  assert_eq!(
    outcome.failure_message(),
    Some("Failed to load model: models/scripted.rknn: no such file")
  );
  assert!(eventually(WAIT, || !engine.is_worker_alive()).await);
  assert_eq!(engine.state(), EngineState::Running);

  engine.submit_frame(numbered(1));
  tokio::time::sleep(Duration::from_millis(50)).await;
  assert!(rx.try_poll().is_none());
  assert!(probe.seen.lock().is_empty());

  engine.stop();
  assert_eq!(engine.state(), EngineState::Stopped);
  assert_eq!(probe.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn oversized_image_size_fails_load_once() {
  let (tx, mut rx) = outcome_channel();
  let engine = Engine::new(config(u32::MAX), ScriptedLoader::default(), tx);
  engine.start().unwrap();

  let outcome = next_outcome(&mut rx, WAIT).await.unwrap();
  let message = outcome.failure_message().unwrap();
  assert!(message.starts_with("Failed to load model: "), "{}", message);
  assert!(eventually(WAIT, || !engine.is_worker_alive()).await);

  engine.stop();
  assert!(rx.try_poll().is_none());
}

#[tokio::test]
async fn stop_from_other_threads_while_frame_in_flight() {
  let loader = ScriptedLoader::default().with_delay(Duration::from_millis(100));
  let probe = loader.probe.clone();
  let (engine, mut rx) = engine(loader);
  let engine = Arc::new(engine);
  engine.start().unwrap();

  engine.submit_frame(numbered(1));
  assert!(eventually(WAIT, || probe.started.load(Ordering::SeqCst) == 1).await);
  engine.submit_frame(numbered(2));

  // 两个线程同时 stop，加入推理线程的操作被串行化
  let stoppers: Vec<_> = (0..2)
    .map(|_| {
      let engine = engine.clone();
      thread::spawn(move || {
        engine.stop();
        (engine.is_worker_alive(), engine.state())
      })
    })
    .collect();
  for stopper in stoppers {
    assert_eq!(stopper.join().unwrap(), (false, EngineState::Stopped));
  }

  let delivered: Vec<Outcome> = std::iter::from_fn(|| rx.try_poll()).collect();
  assert!(delivered.len() <= 1);
  assert_eq!(probe.started.load(Ordering::SeqCst), 1);

  tokio::time::sleep(Duration::from_millis(150)).await;
  assert!(rx.try_poll().is_none());
}

#[tokio::test]
async fn frame_failure_does_not_stop_worker() {
  let (engine, mut rx) = engine(ScriptedLoader::default());
  engine.start().unwrap();

  engine.submit_frame(numbered(CORRUPT));
  let failure = next_outcome(&mut rx, WAIT).await.unwrap();
  assert_eq!(
    failure.failure_message(),
    Some("Failed to process frame: corrupt frame")
  );

  engine.submit_frame(numbered(7));
  let success = next_outcome(&mut rx, WAIT).await.unwrap();
  assert_eq!(seq_of(&success), Some(7));
  assert!(engine.is_worker_alive());
}

#[tokio::test]
async fn restart_loads_model_again() {
  let loader = ScriptedLoader::default();
  let probe = loader.probe.clone();
  let (engine, mut rx) = engine(loader);

  engine.start().unwrap();
  engine.stop();
  engine.start().unwrap();
  engine.submit_frame(numbered(3));

  let outcome = next_outcome(&mut rx, WAIT).await.unwrap();
  assert_eq!(seq_of(&outcome), Some(3));
  assert_eq!(probe.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dropping_engine_joins_worker() {
  let (engine, mut rx) = engine(ScriptedLoader::default().with_delay(Duration::from_millis(10)));
  engine.start().unwrap();
  engine.submit_frame(numbered(1));
  drop(engine);

  // 所有发送端都随推理线程一起释放，通道随即关闭
  let drained = tokio::time::timeout(WAIT, async {
    while rx.recv().await.is_some() {}
  })
  .await;
  assert!(drained.is_ok());
}

#[test]
fn start_without_runtime_is_not_ready() {
  let (engine, _rx) = engine(ScriptedLoader::default());
  assert!(matches!(engine.start(), Err(EngineError::NotReady)));
  assert!(!engine.is_worker_alive());
}

#[test]
fn stop_without_start() {
  let (tx, _rx) = outcome_channel();
  let engine = Engine::new(config(WARMUP_SIZE), ScriptedLoader::default(), tx);
  engine.stop();
  assert_eq!(engine.state(), EngineState::Stopped);
}

#[tokio::test]
async fn consumer_activity_follows_receiver() {
  let (engine, rx) = engine(ScriptedLoader::default());
  assert!(!engine.is_consumer_active());
  engine.start().unwrap();
  assert!(engine.is_consumer_active());
  drop(rx);
  assert!(!engine.is_consumer_active());
}
