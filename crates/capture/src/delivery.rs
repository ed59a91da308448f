use {
    crate::*,
    std::{
        collections::BTreeMap,
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
    },
    tokio::sync::mpsc,
};

/// Why a sequence number will never produce a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Dropped(DropReason),
    StaleTarget,
    Cancelled,
}

#[derive(Debug)]
enum Completion {
    Ready { frame: Frame, slot: InFlightSlot },
    Skipped { sequence: u64, reason: SkipReason },
    Fault { sequence: u64, error: CaptureError },
}

impl Completion {
    fn sequence(&self) -> u64 {
        match self {
            Completion::Ready { frame, .. } => frame.sequence(),
            Completion::Skipped { sequence, .. } | Completion::Fault { sequence, .. } => *sequence,
        }
    }
}

/// Create the two ends of a delivery channel.
pub fn delivery_channel(stats: Arc<PipelineStats>) -> (DeliverySender, DeliveryChannel) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let allocated = Arc::new(AtomicU64::new(0));
    (
        DeliverySender {
            sender,
            allocated: Arc::clone(&allocated),
        },
        DeliveryChannel {
            receiver,
            pending: BTreeMap::new(),
            next: 0,
            allocated,
            stats,
            closed: false,
        },
    )
}

/// Producer side. Sequence numbers are allocated here so the consumer always
/// knows how many results it is owed; every allocated number must later be
/// resolved by exactly one `push`, `skip` or `fault`.
#[derive(Clone, Debug)]
pub struct DeliverySender {
    sender: mpsc::UnboundedSender<Completion>,
    allocated: Arc<AtomicU64>,
}

impl DeliverySender {
    /// Reserve the next sequence number.
    pub fn allocate(&self) -> u64 {
        self.allocated.fetch_add(1, Ordering::AcqRel)
    }

    /// Hand over a completed frame. Returns `false` if the consumer is gone.
    pub fn push(&self, frame: Frame, slot: InFlightSlot) -> bool {
        self.sender.send(Completion::Ready { frame, slot }).is_ok()
    }

    /// Report a sequence number that will never produce a frame.
    pub fn skip(&self, sequence: u64, reason: SkipReason) -> bool {
        self.sender
            .send(Completion::Skipped { sequence, reason })
            .is_ok()
    }

    /// Report a defect at `sequence`; the consumer receives it as an error in order.
    pub fn fault(&self, sequence: u64, error: CaptureError) -> bool {
        self.sender
            .send(Completion::Fault { sequence, error })
            .is_ok()
    }
}

/// Consumer side. Holds early arrivals until every lower sequence number has
/// been delivered or skipped, so frames come out in strictly increasing order.
#[derive(Debug)]
pub struct DeliveryChannel {
    receiver: mpsc::UnboundedReceiver<Completion>,
    pending: BTreeMap<u64, Completion>,
    next: u64,
    allocated: Arc<AtomicU64>,
    stats: Arc<PipelineStats>,
    closed: bool,
}

impl DeliveryChannel {
    /// The sequence number the next `pop` resolves.
    pub fn next_sequence(&self) -> u64 {
        self.next
    }

    /// Results that arrived ahead of their turn.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Allocated sequence numbers not yet resolved for the consumer.
    pub fn outstanding(&self) -> u64 {
        self.allocated.load(Ordering::Acquire).saturating_sub(self.next)
    }

    /// Wait for the next frame in sequence order.
    ///
    /// Returns `Ok(None)` when nothing is outstanding, an error if the next
    /// sequence number carries a defect, and `Closed` if the producer went
    /// away with results still owed.
    pub async fn pop(&mut self) -> Result<Option<Frame>, CaptureError> {
        loop {
            if let Some(result) = self.take_ready() {
                return result;
            }
            match self.receiver.recv().await {
                Some(completion) => self.absorb(completion),
                None => return self.closed_result(),
            }
        }
    }

    /// Blocking form of `pop`. Must not be called from async code.
    pub fn blocking_pop(&mut self) -> Result<Option<Frame>, CaptureError> {
        loop {
            if let Some(result) = self.take_ready() {
                return result;
            }
            match self.receiver.blocking_recv() {
                Some(completion) => self.absorb(completion),
                None => return self.closed_result(),
            }
        }
    }

    /// Return the next frame if it is already complete, `Ok(None)` otherwise.
    pub fn try_pop(&mut self) -> Result<Option<Frame>, CaptureError> {
        loop {
            match self.receiver.try_recv() {
                Ok(completion) => self.absorb(completion),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        match self.take_ready() {
            Some(result) => result,
            None if self.closed => Err(CaptureError::Closed),
            None => Ok(None),
        }
    }

    fn absorb(&mut self, completion: Completion) {
        let sequence = completion.sequence();
        if sequence < self.next || self.pending.contains_key(&sequence) {
            log::error!("delivery: duplicate result for sequence {sequence}, ignored");
            return;
        }
        self.pending.insert(sequence, completion);
    }

    // Some(..) when the caller can return without waiting
    fn take_ready(&mut self) -> Option<Result<Option<Frame>, CaptureError>> {
        while let Some(completion) = self.pending.remove(&self.next) {
            self.next += 1;
            match completion {
                Completion::Ready { frame, slot } => {
                    drop(slot);
                    self.stats.record_delivered();
                    return Some(Ok(Some(frame)));
                }
                Completion::Skipped { sequence, reason } => {
                    log::debug!("delivery: sequence {sequence} skipped ({reason:?})");
                }
                Completion::Fault { error, .. } => return Some(Err(error)),
            }
        }
        if self.outstanding() == 0 {
            return Some(Ok(None));
        }
        None
    }

    fn closed_result(&mut self) -> Result<Option<Frame>, CaptureError> {
        self.closed = true;
        match self.take_ready() {
            Some(result) => result,
            None => Err(CaptureError::Closed),
        }
    }
}
