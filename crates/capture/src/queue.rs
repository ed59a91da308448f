use {
    crate::*,
    std::sync::Arc,
    tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc},
};

/// One unit of in-flight capacity. It travels with a request through the
/// worker and the delivery channel, and frees its slot when dropped.
#[derive(Debug)]
pub struct InFlightSlot {
    _permit: Option<OwnedSemaphorePermit>,
}

impl InFlightSlot {
    /// A slot not tied to any queue.
    pub fn untracked() -> Self {
        Self { _permit: None }
    }
}

/// A request that was accepted into the queue, with the slot it holds.
#[derive(Debug)]
pub struct InFlight {
    pub request: CaptureRequest,
    pub slot: InFlightSlot,
}

/// Create a readback queue admitting at most `capacity` outstanding requests.
pub fn readback_queue(capacity: usize) -> (ReadbackQueue, ReadbackReceiver) {
    let capacity = capacity.max(1);
    let (sender, receiver) = mpsc::channel(capacity);
    (
        ReadbackQueue {
            sender: Some(sender),
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        },
        ReadbackReceiver { receiver },
    )
}

/// Producer side, used from the simulation thread. Never blocks.
///
/// Capacity counts requests from enqueue until their slot is released, which
/// happens when the frame is delivered or discarded, not when the worker
/// dequeues it.
pub struct ReadbackQueue {
    sender: Option<mpsc::Sender<InFlight>>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl ReadbackQueue {
    /// Enqueue a request, or return `false` (dropping the request) if
    /// `capacity` requests are already outstanding or the queue is closed.
    pub fn try_enqueue(&self, request: CaptureRequest) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
            return false;
        };
        let in_flight = InFlight {
            request,
            slot: InFlightSlot {
                _permit: Some(permit),
            },
        };
        // cannot be full: the channel holds at most as many items as there are slots
        sender.try_send(in_flight).is_ok()
    }

    /// Stop accepting requests. The receiver still drains what was queued.
    pub fn close(&mut self) {
        self.sender = None;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    pub fn is_full(&self) -> bool {
        self.slots.available_permits() == 0
    }

    /// Closed by `close`, or the receiver is gone.
    pub fn is_closed(&self) -> bool {
        self.sender.as_ref().is_none_or(|sender| sender.is_closed())
    }
}

/// Consumer side, owned by the transfer worker.
pub struct ReadbackReceiver {
    receiver: mpsc::Receiver<InFlight>,
}

impl ReadbackReceiver {
    /// Wait for the next request. `None` once the queue is closed and empty.
    pub async fn dequeue(&mut self) -> Option<InFlight> {
        self.receiver.recv().await
    }

    /// Blocking form of `dequeue`. Must not be called from async code.
    pub fn blocking_dequeue(&mut self) -> Option<InFlight> {
        self.receiver.blocking_recv()
    }

    /// Stop accepting requests; queued ones can still be dequeued.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
