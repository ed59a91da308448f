use {
    base::init_stdout_logger,
    capture::*,
    image::Image,
    std::{sync::Arc, time::Duration},
};

const TICK_SECONDS: f64 = 1.0 / 30.0;

#[derive(Default)]
struct Recorder {
    frames: u64,
    bytes: usize,
    last_sequence: Option<u64>,
    last: Option<Image>,
}

impl FramePublisher for Recorder {
    fn on_frame_ready(&mut self, frame: Frame) {
        if let Some(last) = self.last_sequence {
            if frame.sequence() <= last {
                log::error!("frame {} published after frame {}", frame.sequence(), last);
            }
        }
        self.frames += 1;
        self.bytes += frame.data().len();
        self.last_sequence = Some(frame.sequence());
        self.last = Some(frame.into_image());
    }
}

// moving gradient so consecutive frames differ
fn draw(image: &mut Image, pass: u64) {
    let width = image.width();
    let shift = (pass * 4) as usize;
    for (index, pixel) in image.data.chunks_exact_mut(4).enumerate() {
        let (x, y) = (index % width, index / width);
        pixel.copy_from_slice(&[
            ((x + shift) % 256) as u8,
            (y % 256) as u8,
            ((x + y + shift) % 256) as u8,
            0xFF,
        ]);
    }
}

fn main() -> anyhow::Result<()> {
    init_stdout_logger();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        eprintln!("Usage: {} [ticks] [copy-latency-ms] [max-in-flight] [output.png]", args[0]);
        return Ok(());
    }
    let ticks = args.get(1).map(|s| s.parse::<u64>()).transpose()?.unwrap_or(120);
    let latency_ms = args.get(2).map(|s| s.parse::<u64>()).transpose()?.unwrap_or(8);
    let max_in_flight = args.get(3).map(|s| s.parse::<usize>()).transpose()?.unwrap_or(2);
    let output = args.get(4);

    let config = CaptureConfig::default()
        .with_max_in_flight(max_in_flight)
        .with_delivery(DeliveryMode::Asynchronous);
    let target = Arc::new(
        SoftwareTarget::new(config.size(), config.format())?
            .with_latency(Duration::from_millis(latency_ms)),
    );

    let mut sensor = SceneCaptureSensor::new(SensorId(0), target.clone(), Recorder::default());
    sensor.configure(config)?;
    sensor.begin_play()?;

    for index in 0..ticks {
        target.render(draw);
        let outcome = sensor.on_tick(Tick::at_rate(index, TICK_SECONDS))?;
        if let Err(dropped) = outcome.capture {
            log::debug!("{dropped}");
        }
        std::thread::sleep(Duration::from_secs_f64(TICK_SECONDS));
    }
    std::thread::sleep(Duration::from_millis(latency_ms * 2));
    sensor.publish_ready()?;

    if let Some(stats) = sensor.stats() {
        log::info!(
            "requested {}, dropped {}, delivered {}, stale {}, cancelled {}",
            stats.requested,
            stats.dropped,
            stats.delivered,
            stats.stale,
            stats.cancelled
        );
    }
    let report = sensor.end_play()?;
    log::info!("teardown: {report:?}");

    let recorder = sensor.publisher();
    log::info!("published {} frames, {} bytes", recorder.frames, recorder.bytes);
    if let (Some(path), Some(image)) = (output, recorder.last.as_ref()) {
        image::save_image(image, path)?;
        log::info!("last frame written to {path}");
    }
    Ok(())
}
