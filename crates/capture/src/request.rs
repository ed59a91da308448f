use {crate::*, base::Epoch};

/// One tick's request to read the render target back into host memory.
///
/// Created by the dispatcher, consumed by the transfer worker. The snapshot
/// keeps the render target referenced until the copy completes.
#[derive(Debug)]
pub struct CaptureRequest {
    sensor: SensorId,
    sequence: u64,
    tick: Tick,
    snapshot: TargetSnapshot,
    epoch: u64,
}

impl CaptureRequest {
    pub fn new(
        sensor: SensorId,
        sequence: u64,
        tick: Tick,
        snapshot: TargetSnapshot,
        epoch: u64,
    ) -> Self {
        Self {
            sensor,
            sequence,
            tick,
            snapshot,
            epoch,
        }
    }

    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn snapshot(&self) -> &TargetSnapshot {
        &self.snapshot
    }

    /// Pipeline epoch the request was made in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether teardown or restart happened after this request was made.
    pub fn is_cancelled(&self, epoch: &Epoch) -> bool {
        !epoch.is_current(self.epoch)
    }
}
