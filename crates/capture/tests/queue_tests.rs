use {
    base::Vec2,
    capture::*,
    image::PixelFormat,
    std::sync::Arc,
};

fn request(target: &Arc<SoftwareTarget>, sequence: u64) -> CaptureRequest {
    let snapshot = TargetSnapshot::new(target.clone());
    CaptureRequest::new(SensorId(0), sequence, Tick::new(sequence, 0.0), snapshot, 0)
}

fn target() -> Arc<SoftwareTarget> {
    Arc::new(SoftwareTarget::new(Vec2::new(4, 4), PixelFormat::Bgra8).unwrap())
}

#[test]
fn test_enqueue_up_to_capacity() {
    let target = target();
    let (queue, _receiver) = readback_queue(2);
    assert_eq!(queue.capacity(), 2);
    assert!(queue.try_enqueue(request(&target, 0)));
    assert!(queue.try_enqueue(request(&target, 1)));
    assert!(queue.is_full());
    assert!(!queue.try_enqueue(request(&target, 2)));
    assert_eq!(queue.in_flight(), 2);
}

#[test]
fn test_slot_held_until_dropped() {
    let target = target();
    let (queue, mut receiver) = readback_queue(1);
    assert!(queue.try_enqueue(request(&target, 0)));

    let InFlight { request: first, slot } = receiver.blocking_dequeue().unwrap();
    assert_eq!(first.sequence(), 0);
    // dequeued but not yet delivered
    assert_eq!(queue.in_flight(), 1);
    assert!(!queue.try_enqueue(request(&target, 1)));

    drop(slot);
    assert_eq!(queue.in_flight(), 0);
    assert!(queue.try_enqueue(request(&target, 2)));
}

#[test]
fn test_rejected_request_releases_target() {
    let target = target();
    let (queue, _receiver) = readback_queue(1);
    assert!(queue.try_enqueue(request(&target, 0)));
    assert!(!queue.try_enqueue(request(&target, 1)));
    assert_eq!(Arc::strong_count(&target), 2);
}

#[test]
fn test_closed_receiver_rejects() {
    let target = target();
    let (queue, receiver) = readback_queue(4);
    drop(receiver);
    assert!(queue.is_closed());
    assert!(!queue.try_enqueue(request(&target, 0)));
    assert_eq!(queue.in_flight(), 0);
}

#[test]
fn test_dequeue_after_sender_dropped() {
    let target = target();
    let (queue, mut receiver) = readback_queue(2);
    assert!(queue.try_enqueue(request(&target, 0)));
    drop(queue);
    assert_eq!(receiver.blocking_dequeue().unwrap().request.sequence(), 0);
    assert!(receiver.blocking_dequeue().is_none());
}

#[test]
fn test_zero_capacity_is_clamped() {
    let (queue, _receiver) = readback_queue(0);
    assert_eq!(queue.capacity(), 1);
}

#[test]
fn test_close_refuses_requests_and_keeps_queued() {
    let target = target();
    let (mut queue, mut receiver) = readback_queue(2);
    assert!(queue.try_enqueue(request(&target, 0)));

    queue.close();
    assert!(queue.is_closed());
    assert!(!queue.try_enqueue(request(&target, 1)));
    assert_eq!(Arc::strong_count(&target), 2);

    let InFlight { request: queued, slot } = receiver.blocking_dequeue().unwrap();
    assert_eq!(queued.sequence(), 0);
    assert!(receiver.blocking_dequeue().is_none());
    drop(slot);
    assert_eq!(queue.in_flight(), 0);
}
