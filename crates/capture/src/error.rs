use {image::ImageError, std::fmt, std::time::Duration};

/// Why a capture was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `max_in_flight` requests are already outstanding.
    QueueFull,
    /// An earlier frame hit a buffer defect; the pipeline accepts no more work.
    Faulted,
    /// The pipeline is shutting down.
    Stopped,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::QueueFull => write!(f, "readback queue full"),
            DropReason::Faulted => write!(f, "pipeline faulted"),
            DropReason::Stopped => write!(f, "pipeline stopped"),
        }
    }
}

/// A tick whose frame was skipped. The sequence number is consumed and
/// reported to the delivery side as skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dropped {
    pub tick: u64,
    pub sequence: u64,
    pub reason: DropReason,
}

impl fmt::Display for Dropped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {} (tick {}) dropped: {}",
            self.sequence, self.tick, self.reason
        )
    }
}

impl std::error::Error for Dropped {}

#[derive(Debug)]
pub enum CaptureError {
    Dropped(Dropped),
    StaleTarget(String),
    Cancelled,
    FatalConfig(String),
    Defect(String),
    NotStarted,
    AlreadyStarted,
    Closed,
    Timeout(Duration),
    Image(ImageError),
    Io(std::io::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Dropped(dropped) => write!(f, "{dropped}"),
            CaptureError::StaleTarget(msg) => write!(f, "stale render target: {msg}"),
            CaptureError::Cancelled => write!(f, "capture cancelled"),
            CaptureError::FatalConfig(msg) => write!(f, "invalid capture configuration: {msg}"),
            CaptureError::Defect(msg) => write!(f, "capture defect: {msg}"),
            CaptureError::NotStarted => write!(f, "capture pipeline not started"),
            CaptureError::AlreadyStarted => {
                write!(f, "capture pipeline already started, settings are frozen")
            }
            CaptureError::Closed => write!(f, "capture pipeline closed"),
            CaptureError::Timeout(after) => write!(f, "readback timed out after {after:?}"),
            CaptureError::Image(err) => write!(f, "image error: {err}"),
            CaptureError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Dropped(dropped) => Some(dropped),
            CaptureError::Image(err) => Some(err),
            CaptureError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Dropped> for CaptureError {
    fn from(dropped: Dropped) -> Self {
        CaptureError::Dropped(dropped)
    }
}

impl From<ImageError> for CaptureError {
    fn from(err: ImageError) -> Self {
        CaptureError::Image(err)
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}
