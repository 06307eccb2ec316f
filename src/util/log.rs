//! Thin convenience re-exports over the `log` crate. Kept as its own module
//! (matching `original_source/include/voxen/util/log.hpp`) so call sites read
//! `util::log::info!(...)` the way the rest of the engine's logging is scoped,
//! even though the macros themselves are just `log`'s.

pub use log::{debug, error, info, trace, warn};

/// Installs the process-wide logger. Only `main.rs`/test harnesses should call
/// this, never library code - matches the teacher's split between `lib.rs`
/// (no logger init) and `main.rs` (`SimpleLogger::new().init()`).
pub fn init(level: log::LevelFilter) {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(level)
        .init();
}
