use core::sync::atomic::{AtomicBool, Ordering};

use log::{LevelFilter, Log, Metadata, Record};
use rtt_target::{rprintln, rtt_init_print};

struct RttLogger;

static LOGGER: RttLogger = RttLogger;
static INITIALIZED: AtomicBool = AtomicBool::new(false);

impl Log for RttLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        rprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Set up the RTT channel and route the log output to it.
/// The host calls `Init` for every operation, only the first call does something.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::Relaxed) {
        return;
    }

    rtt_init_print!(NoBlockSkip, 1024);

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
}
