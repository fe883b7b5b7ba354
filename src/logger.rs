//! Logger initialization.

use std::io::Write;

use log::LevelFilter;

/// Initializes `env_logger`, writing to stderr.
///
/// `RUST_LOG` is read first and `level` overrides it for this crate, so
/// both `RUST_LOG=dolgeo=debug` and `--log-level debug` work. Report output
/// goes to stdout and is never interleaved with log lines.
///
/// Calling this more than once is harmless: later calls are ignored.
pub fn init_logger(level: LevelFilter) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_module("dolgeo", level);
    builder.format(|buf, record| {
        let style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{style}{}{style:#} {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
    });

    // try_init so tests that initialize repeatedly don't panic
    let _ = builder.try_init();
}
