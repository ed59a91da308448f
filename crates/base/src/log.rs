use {
    ::log::{LevelFilter, Log, Metadata, Record},
    std::{
        io::Write,
        str::FromStr,
        time::{SystemTime, UNIX_EPOCH},
    },
};

// environment variable holding the maximum log level
pub const LOG_LEVEL_VAR: &str = "DELI_LOG";

/// Logger that writes one line per record to stdout.
pub struct StdoutLogger;

impl Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= ::log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = std::thread::current();
        let thread_name = thread
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:?}", thread.id()));
        println!(
            "{} [{}] [thread:{}] {}:{} - {}",
            format_timestamp(),
            record.level(),
            thread_name,
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        );
    }

    fn flush(&self) {
        std::io::stdout().flush().ok();
    }
}

static STDOUT_LOGGER: StdoutLogger = StdoutLogger;

/// Parse a level name (`error`, `warn`, `info`, `debug`, `trace`, `off`).
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    LevelFilter::from_str(name.trim()).ok()
}

/// Install the stdout logger.
///
/// The level is read from `DELI_LOG` and defaults to `info`. Calling this
/// more than once only updates the level.
pub fn init_stdout_logger() {
    let level = std::env::var(LOG_LEVEL_VAR)
        .ok()
        .and_then(|name| parse_level(&name))
        .unwrap_or(LevelFilter::Info);
    init_stdout_logger_with_level(level);
}

pub fn init_stdout_logger_with_level(level: LevelFilter) {
    // a second install fails, which only means a logger is already in place
    let _ = ::log::set_logger(&STDOUT_LOGGER);
    ::log::set_max_level(level);
}

/// UTC timestamp as `YYYY-MM-DDTHH:MM:SS.mmm`.
pub fn format_timestamp() -> String {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = since_epoch.as_secs();
    let (year, month, day) = civil_from_days((secs / 86400) as i64);
    let time_of_day = secs % 86400;
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60,
        since_epoch.subsec_millis()
    )
}

// days since 1970-01-01 to (year, month, day), proleptic Gregorian
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}
