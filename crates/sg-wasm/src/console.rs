//! `log` backend writing to the browser console.

use std::str::FromStr;

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::JsValue;

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = JsValue::from_str(&format!("[sweepguard] {}", record.args()));
        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

/// Install the console logger (once) and set the level. Unknown level names
/// fall back to `info`.
pub fn install(level: Option<&str>) -> LevelFilter {
    let filter = level
        .and_then(|name| LevelFilter::from_str(name).ok())
        .unwrap_or(LevelFilter::Info);

    // Already installed on a second call
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(filter);
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(install(Some("debug")), LevelFilter::Debug);
        assert_eq!(install(Some("WARN")), LevelFilter::Warn);
        assert_eq!(install(Some("chatty")), LevelFilter::Info);
        assert_eq!(install(None), LevelFilter::Info);
    }
}
