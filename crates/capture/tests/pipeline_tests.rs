mod common;

use {
    base::Vec2,
    capture::*,
    common::*,
    image::PixelFormat,
    std::{
        sync::{Arc, mpsc},
        thread,
        time::{Duration, Instant},
    },
};

fn gated(config: &CaptureConfig) -> Arc<GatedTarget> {
    Arc::new(GatedTarget::new(config.size(), config.format()))
}

fn start(config: CaptureConfig, target: Arc<dyn RenderTarget>) -> CapturePipeline {
    CapturePipeline::start(SensorId(0), config, target).unwrap()
}

fn pop_sequence(pipeline: &mut CapturePipeline) -> u64 {
    pipeline.blocking_pop().unwrap().expect("expected a frame").sequence()
}

// Poll until `count` early results are parked in the delivery channel.
fn wait_for_pending(pipeline: &mut CapturePipeline, count: usize) {
    for _ in 0..500 {
        assert!(pipeline.try_pop().unwrap().is_none());
        if pipeline.delivery().pending() >= count {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("only {} results parked", pipeline.delivery().pending());
}

// Pop until nothing is outstanding, on another thread so a stall fails the test.
fn drain_within(mut pipeline: CapturePipeline, limit: Duration) -> (Vec<u64>, CapturePipeline) {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut sequences = vec![];
        while let Some(frame) = pipeline.blocking_pop().unwrap() {
            sequences.push(frame.sequence());
        }
        let _ = sender.send((sequences, pipeline));
    });
    receiver.recv_timeout(limit).expect("delivery stalled")
}

#[test]
fn test_capture_every_tick() {
    let config = CaptureConfig::default();
    let target = Arc::new(SoftwareTarget::new(config.size(), config.format()).unwrap());
    let mut pipeline = start(config, target.clone());

    for index in 0..5 {
        target.render(|image, pass| image.data.fill(pass as u8));
        assert_eq!(pipeline.request_capture(Tick::at_rate(index, 0.05)), Ok(index));
        let frame = pipeline.blocking_pop().unwrap().unwrap();
        assert_eq!(frame.sequence(), index);
        assert_eq!(frame.tick().index, index);
        assert_eq!(frame.width(), 800);
        assert_eq!(frame.height(), 600);
        assert_eq!(frame.format(), PixelFormat::Bgra8);
        assert_eq!(frame.data().len(), 1_920_000);
        assert!(frame.data().iter().all(|&byte| byte == index as u8 + 1));
    }
    assert!(pipeline.blocking_pop().unwrap().is_none());

    let stats = pipeline.stats();
    assert_eq!(stats.requested, 5);
    assert_eq!(stats.delivered, 5);
    assert_eq!(stats.dropped, 0);
}

#[test]
fn test_drop_when_queue_full() {
    let config = small_config();
    let target = gated(&config);
    let mut pipeline = start(config, target.clone());

    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    assert_eq!(
        pipeline.request_capture(Tick::new(1, 0.1)),
        Err(Dropped {
            tick: 1,
            sequence: 1,
            reason: DropReason::QueueFull,
        })
    );

    target.release(0);
    let frame = pipeline.blocking_pop().unwrap().unwrap();
    assert_eq!(frame.sequence(), 0);
    assert!(frame.data().iter().all(|&byte| byte == 0));
    drop(frame);

    // sequence 1 never arrives; the next frame is 2
    assert_eq!(pipeline.request_capture(Tick::new(2, 0.2)), Ok(2));
    target.release(1);
    let frame = pipeline.blocking_pop().unwrap().unwrap();
    assert_eq!(frame.sequence(), 2);
    assert!(frame.data().iter().all(|&byte| byte == 1));
    assert!(pipeline.blocking_pop().unwrap().is_none());

    let stats = pipeline.stats();
    assert_eq!(stats.requested, 3);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.delivered, 2);
}

#[test]
fn test_in_flight_never_exceeds_capacity() {
    let config = small_config().with_max_in_flight(2);
    let target = gated(&config);
    let mut pipeline = start(config, target.clone());

    let mut accepted = vec![];
    for index in 0..6 {
        match pipeline.request_capture(Tick::new(index, 0.0)) {
            Ok(sequence) => accepted.push(sequence),
            Err(dropped) => {
                assert_eq!(dropped.reason, DropReason::QueueFull);
                assert_eq!(dropped.sequence, index);
            }
        }
        assert!(pipeline.in_flight() <= 2);
    }
    assert_eq!(accepted, vec![0, 1]);
    assert_eq!(pipeline.in_flight(), 2);

    target.open();
    assert_eq!(pop_sequence(&mut pipeline), 0);
    assert_eq!(pop_sequence(&mut pipeline), 1);
    assert!(pipeline.blocking_pop().unwrap().is_none());
    assert_eq!(pipeline.in_flight(), 0);
}

#[test]
fn test_out_of_order_completion_delivered_in_order() {
    let config = small_config().with_max_in_flight(3);
    let target = gated(&config);
    let mut pipeline = start(config, target.clone());

    for index in 0..3 {
        assert_eq!(pipeline.request_capture(Tick::new(index, 0.0)), Ok(index));
    }
    target.wait_for_copies(3);

    target.release(2);
    target.release(1);
    wait_for_pending(&mut pipeline, 2);
    assert_eq!(pipeline.delivery().next_sequence(), 0);

    target.release(0);
    let frames: Vec<_> = (0..3)
        .map(|_| pipeline.blocking_pop().unwrap().unwrap())
        .collect();
    let sequences: Vec<_> = frames.iter().map(Frame::sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    for frame in &frames {
        assert!(frame.data().iter().all(|&byte| byte == frame.sequence() as u8));
    }
}

#[test]
fn test_gaps_do_not_stall_delivery() {
    let config = small_config();
    let target = gated(&config);
    let mut pipeline = start(config, target.clone());

    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    assert!(pipeline.request_capture(Tick::new(1, 0.0)).is_err());
    assert!(pipeline.request_capture(Tick::new(2, 0.0)).is_err());
    target.open();
    assert_eq!(pop_sequence(&mut pipeline), 0);

    assert_eq!(pipeline.request_capture(Tick::new(3, 0.0)), Ok(3));
    assert_eq!(pop_sequence(&mut pipeline), 3);
    assert!(pipeline.blocking_pop().unwrap().is_none());
}

#[test]
fn test_resized_target_discards_frame() {
    let config = small_config();
    let target = Arc::new(
        SoftwareTarget::new(config.size(), config.format())
            .unwrap()
            .with_latency(Duration::from_millis(100)),
    );
    let mut pipeline = start(config, target.clone());

    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    target.resize(Vec2::new(16, 8)).unwrap();
    assert!(pipeline.blocking_pop().unwrap().is_none());
    assert_eq!(pipeline.stats().stale, 1);

    // the pipeline keeps its configured size until restarted
    assert_eq!(pipeline.request_capture(Tick::new(1, 0.0)), Ok(1));
    assert!(pipeline.blocking_pop().unwrap().is_none());
    assert_eq!(pipeline.stats().stale, 2);
    assert_eq!(pipeline.stats().delivered, 0);
}

#[test]
fn test_released_target_discards_frame() {
    let config = small_config();
    let target = Arc::new(
        SoftwareTarget::new(config.size(), config.format())
            .unwrap()
            .with_latency(Duration::from_millis(50)),
    );
    let mut pipeline = start(config, target.clone());

    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    target.release();
    assert!(pipeline.blocking_pop().unwrap().is_none());
    assert_eq!(pipeline.stats().stale, 1);
}

#[test]
fn test_copy_timeout_discards_frame() {
    let config = small_config().with_copy_timeout(Duration::from_millis(20));
    let target = gated(&config);
    let mut pipeline = start(config, target.clone());

    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    assert!(pipeline.blocking_pop().unwrap().is_none());
    assert_eq!(pipeline.stats().stale, 1);

    target.open();
    assert_eq!(pipeline.request_capture(Tick::new(1, 0.0)), Ok(1));
    assert_eq!(pop_sequence(&mut pipeline), 1);
}

#[test]
fn test_length_mismatch_is_defect() {
    let config = small_config();
    let target = Arc::new(GatedTarget::new(config.size(), config.format()).truncating());
    target.open();
    let mut pipeline = start(config, target);

    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    assert!(matches!(pipeline.blocking_pop(), Err(CaptureError::Defect(_))));
    assert_eq!(
        pipeline.request_capture(Tick::new(1, 0.0)),
        Err(Dropped {
            tick: 1,
            sequence: 1,
            reason: DropReason::Faulted,
        })
    );
    assert!(pipeline.blocking_pop().unwrap().is_none());
    assert_eq!(pipeline.stats().faults, 1);
}

#[test]
fn test_panicking_copy_does_not_stall_delivery() {
    let config = small_config().with_max_in_flight(2);
    let target = Arc::new(PanickingTarget::new(config.size(), config.format()));
    let mut pipeline = start(config, target.clone());

    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    assert_eq!(pipeline.request_capture(Tick::new(1, 0.0)), Ok(1));
    let (sequences, mut pipeline) = drain_within(pipeline, Duration::from_secs(5));
    assert_eq!(sequences, vec![1]);
    assert_eq!(pipeline.stats().stale, 1);
    assert_eq!(pipeline.in_flight(), 0);

    assert_eq!(pipeline.request_capture(Tick::new(2, 0.0)), Ok(2));
    let (sequences, pipeline) = drain_within(pipeline, Duration::from_secs(5));
    assert_eq!(sequences, vec![2]);
    pipeline.teardown().unwrap();
    assert_eq!(Arc::strong_count(&target), 1);
}

#[test]
fn test_panic_while_issuing_copy_does_not_stall_delivery() {
    let config = small_config().with_max_in_flight(2);
    let target = Arc::new(
        PanickingTarget::new(config.size(), config.format()).panicking_on_issue(),
    );
    let mut pipeline = start(config, target);

    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    assert_eq!(pipeline.request_capture(Tick::new(1, 0.0)), Ok(1));
    let (sequences, mut pipeline) = drain_within(pipeline, Duration::from_secs(5));
    assert_eq!(sequences, vec![1]);

    // the worker survives and keeps copying
    assert_eq!(pipeline.request_capture(Tick::new(2, 0.0)), Ok(2));
    let (sequences, _) = drain_within(pipeline, Duration::from_secs(5));
    assert_eq!(sequences, vec![2]);
}

#[test]
fn test_invalid_config_is_fatal() {
    let target = Arc::new(SoftwareTarget::new(Vec2::new(8, 4), PixelFormat::Bgra8).unwrap());

    let zero = small_config().with_width(0);
    assert!(matches!(
        CapturePipeline::start(SensorId(0), zero, target.clone()),
        Err(CaptureError::FatalConfig(_))
    ));

    let no_slots = small_config().with_max_in_flight(0);
    assert!(matches!(
        CapturePipeline::start(SensorId(0), no_slots, target.clone()),
        Err(CaptureError::FatalConfig(_))
    ));

    let wrong_size = small_config().with_size(16, 8);
    assert!(matches!(
        CapturePipeline::start(SensorId(0), wrong_size, target.clone()),
        Err(CaptureError::FatalConfig(_))
    ));

    let wrong_format = small_config().with_format(PixelFormat::R32Float);
    assert!(matches!(
        CapturePipeline::start(SensorId(0), wrong_format, target.clone()),
        Err(CaptureError::FatalConfig(_))
    ));

    target.release();
    assert!(matches!(
        CapturePipeline::start(SensorId(0), small_config(), target.clone()),
        Err(CaptureError::FatalConfig(_))
    ));
    assert_eq!(Arc::strong_count(&target), 1);
}

#[test]
fn test_teardown_forces_stuck_copies() {
    let config = small_config()
        .with_max_in_flight(3)
        .with_copy_timeout(Duration::from_secs(30))
        .with_drain_timeout(Duration::from_millis(100));
    let target = gated(&config);
    let mut pipeline = start(config, target.clone());

    for index in 0..3 {
        assert_eq!(pipeline.request_capture(Tick::new(index, 0.0)), Ok(index));
    }
    target.wait_for_copies(3);

    let started = Instant::now();
    let report = pipeline.teardown().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.forced, 3);
    assert_eq!(report.outstanding, 3);
    assert_eq!(report.cancelled, 3);
    assert_eq!(Arc::strong_count(&target), 1);
}

#[test]
fn test_teardown_cancels_outstanding() {
    let config = small_config()
        .with_max_in_flight(2)
        .with_drain_timeout(Duration::from_secs(2));
    let target = Arc::new(
        SoftwareTarget::new(config.size(), config.format())
            .unwrap()
            .with_latency(Duration::from_millis(100)),
    );
    let mut pipeline = start(config, target.clone());

    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    assert_eq!(pipeline.request_capture(Tick::new(1, 0.0)), Ok(1));

    let report = pipeline.teardown().unwrap();
    assert_eq!(report.outstanding, 2);
    assert_eq!(report.cancelled, 2);
    assert_eq!(report.forced, 0);
    assert_eq!(Arc::strong_count(&target), 1);
}

#[test]
fn test_teardown_idle_pipeline() {
    let config = small_config();
    let target = Arc::new(SoftwareTarget::new(config.size(), config.format()).unwrap());
    let pipeline = start(config, target.clone());

    let report = pipeline.teardown().unwrap();
    assert_eq!(report.outstanding, 0);
    assert_eq!(report.cancelled, 0);
    assert_eq!(report.forced, 0);
    assert_eq!(Arc::strong_count(&target), 1);
}

#[test]
fn test_drop_releases_target() {
    let config = small_config();
    let target = gated(&config);
    {
        let config = config.with_drain_timeout(Duration::from_millis(50));
        let mut pipeline = start(config, target.clone());
        assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    }
    assert_eq!(Arc::strong_count(&target), 1);
}

#[test]
fn test_restart_applies_new_config() {
    let config = small_config();
    let target = Arc::new(SoftwareTarget::new(config.size(), config.format()).unwrap());
    let mut pipeline = start(config.clone(), target.clone());
    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    assert_eq!(pop_sequence(&mut pipeline), 0);

    let (mut pipeline, report) = pipeline.restart(config.with_max_in_flight(4)).unwrap();
    assert_eq!(report.outstanding, 0);
    assert_eq!(pipeline.config().max_in_flight(), 4);
    assert_eq!(pipeline.stats().requested, 0);

    // numbering starts over
    assert_eq!(pipeline.request_capture(Tick::new(1, 0.0)), Ok(0));
    assert_eq!(pop_sequence(&mut pipeline), 0);
}

#[tokio::test]
async fn test_async_pop() {
    let config = small_config().with_max_in_flight(2);
    let target = Arc::new(
        SoftwareTarget::new(config.size(), config.format())
            .unwrap()
            .with_latency(Duration::from_millis(5)),
    );
    let mut pipeline = start(config, target);

    assert_eq!(pipeline.request_capture(Tick::new(0, 0.0)), Ok(0));
    assert_eq!(pipeline.request_capture(Tick::new(1, 0.0)), Ok(1));
    assert_eq!(pipeline.pop().await.unwrap().unwrap().sequence(), 0);
    assert_eq!(pipeline.pop().await.unwrap().unwrap().sequence(), 1);
    assert!(pipeline.pop().await.unwrap().is_none());
}
