use env_logger::Builder;
use log::{info, LevelFilter};
use std::io::Write;

// Colourised logger; RUST_LOG overrides the Debug default
pub fn setup_logger() {
    let mut builder = Builder::new();

    builder.format(|buf, record| {
        let level_color = match record.level() {
            log::Level::Error => "\x1B[1;31m", // Bold Red
            log::Level::Warn => "\x1B[1;33m",  // Bold Yellow
            log::Level::Info => "\x1B[1;32m",  // Bold Green
            log::Level::Debug => "\x1B[1;36m", // Bold Cyan
            log::Level::Trace => "\x1B[1;35m", // Bold Magenta
        };
        let reset = "\x1B[0m";

        writeln!(
            buf,
            "[{}] {}{:<5}{} {}: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            level_color,
            record.level(),
            reset,
            record.target(),
            record.args()
        )
    });

    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            builder
                .filter(None, LevelFilter::Debug)
                // r2d2 and diesel internals are noisy at debug
                .filter(Some("r2d2"), LevelFilter::Info);
        }
    }

    if builder.try_init().is_err() {
        return;
    }

    info!("Logger initialized");
}
