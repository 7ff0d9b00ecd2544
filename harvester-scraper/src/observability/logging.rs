use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sets up console plus rotating-file logging for the whole process.
///
/// Console output is human-formatted; the daily `logs/harvester.log` file
/// gets JSON lines for later inspection. `RUST_LOG` overrides the default
/// filter when set.
pub fn init_logging() {
    let _ = fs::create_dir_all("logs");

    let file_appender = tracing_appender::rolling::daily("logs", "harvester.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(file_writer);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("harvester_scraper=debug,harvester_core=debug,info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    // The guard flushes the file writer on drop; leak it so logging stays
    // alive for the lifetime of the process
    std::mem::forget(guard);
}
