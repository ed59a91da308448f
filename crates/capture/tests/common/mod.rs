#![allow(dead_code)]

use {
    base::Vec2,
    capture::*,
    image::PixelFormat,
    std::{
        collections::{HashSet, VecDeque},
        sync::{
            Mutex,
            atomic::{AtomicU64, AtomicUsize, Ordering},
        },
        time::Duration,
    },
    tokio::sync::oneshot,
};

#[derive(Default)]
struct Gates {
    issued: usize,
    waiting: Vec<Option<oneshot::Sender<()>>>,
    released: HashSet<usize>,
    open: bool,
}

/// Render target whose copies only complete when the test releases them.
///
/// Copy number `n` (in issue order) is released by `release(n)`, which may
/// come before or after the copy is issued. Each copy's bytes are filled
/// with `n as u8`.
pub struct GatedTarget {
    size: Vec2<usize>,
    format: PixelFormat,
    gates: Mutex<Gates>,
    generation: AtomicU64,
    truncate: bool,
}

impl GatedTarget {
    pub fn new(size: Vec2<usize>, format: PixelFormat) -> Self {
        Self {
            size,
            format,
            gates: Mutex::new(Gates::default()),
            generation: AtomicU64::new(1),
            truncate: false,
        }
    }

    /// Every copy returns one byte too few.
    pub fn truncating(mut self) -> Self {
        self.truncate = true;
        self
    }

    pub fn release(&self, copy: usize) {
        let mut gates = self.gates.lock().unwrap();
        match gates.waiting.get_mut(copy).and_then(Option::take) {
            Some(sender) => {
                let _ = sender.send(());
            }
            None => {
                gates.released.insert(copy);
            }
        }
    }

    /// Release every copy, issued or future.
    pub fn open(&self) {
        let mut gates = self.gates.lock().unwrap();
        gates.open = true;
        for sender in gates.waiting.iter_mut().filter_map(Option::take) {
            let _ = sender.send(());
        }
    }

    pub fn issued(&self) -> usize {
        self.gates.lock().unwrap().issued
    }

    /// Poll until `count` copies have been issued.
    pub fn wait_for_copies(&self, count: usize) {
        for _ in 0..500 {
            if self.issued() >= count {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("only {} of {} copies issued", self.issued(), count);
    }
}

impl RenderTarget for GatedTarget {
    fn size(&self) -> Vec2<usize> {
        self.size
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn copy_region_to_host(&self, region: Region) -> Readback {
        let mut gates = self.gates.lock().unwrap();
        let copy = gates.issued;
        gates.issued += 1;
        let mut len = region.byte_len(self.format).unwrap();
        if self.truncate {
            len -= 1;
        }
        let data = vec![copy as u8; len];
        if gates.open || gates.released.remove(&copy) {
            gates.waiting.push(None);
            return Box::pin(async move { Ok(data) });
        }
        let (sender, receiver) = oneshot::channel();
        gates.waiting.push(Some(sender));
        Box::pin(async move {
            receiver
                .await
                .map_err(|_| CaptureError::StaleTarget("gate dropped".to_string()))?;
            Ok(data)
        })
    }
}

/// Render target whose n-th copy takes the n-th latency from a list.
pub struct LatencyTarget {
    size: Vec2<usize>,
    format: PixelFormat,
    latencies: Mutex<VecDeque<Duration>>,
}

impl LatencyTarget {
    pub fn new(size: Vec2<usize>, format: PixelFormat, latencies: Vec<Duration>) -> Self {
        Self {
            size,
            format,
            latencies: Mutex::new(latencies.into()),
        }
    }
}

impl RenderTarget for LatencyTarget {
    fn size(&self) -> Vec2<usize> {
        self.size
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn generation(&self) -> u64 {
        1
    }

    fn copy_region_to_host(&self, region: Region) -> Readback {
        let latency = self
            .latencies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Duration::ZERO);
        let data = vec![0u8; region.byte_len(self.format).unwrap()];
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            Ok(data)
        })
    }
}

/// Render target whose first copy panics, either while the copy is issued or
/// while its completion is awaited. Later copies complete immediately.
pub struct PanickingTarget {
    size: Vec2<usize>,
    format: PixelFormat,
    copies: AtomicUsize,
    on_issue: bool,
}

impl PanickingTarget {
    pub fn new(size: Vec2<usize>, format: PixelFormat) -> Self {
        Self {
            size,
            format,
            copies: AtomicUsize::new(0),
            on_issue: false,
        }
    }

    pub fn panicking_on_issue(mut self) -> Self {
        self.on_issue = true;
        self
    }
}

impl RenderTarget for PanickingTarget {
    fn size(&self) -> Vec2<usize> {
        self.size
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn generation(&self) -> u64 {
        1
    }

    fn copy_region_to_host(&self, region: Region) -> Readback {
        let copy = self.copies.fetch_add(1, Ordering::AcqRel);
        if copy == 0 && self.on_issue {
            panic!("copy engine lost");
        }
        let fail = copy == 0;
        let data = vec![copy as u8; region.byte_len(self.format).unwrap()];
        Box::pin(async move {
            tokio::task::yield_now().await;
            if fail {
                panic!("fence lost");
            }
            Ok(data)
        })
    }
}

pub fn small_config() -> CaptureConfig {
    CaptureConfig::default().with_size(8, 4)
}
