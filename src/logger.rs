//! Opt-in tracing setup.

use std::fs::File;
use std::path::Path;

use time::{format_description, OffsetDateTime};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Installs a global subscriber writing to a timestamped log file in
/// `directory`. Will panic on error.
pub fn init_logger(directory: impl AsRef<Path>) {
    let directory = directory.as_ref();
    if !directory.exists() {
        std::fs::create_dir_all(directory).unwrap_or_else(|e| {
            panic!("could not create log directory {}: {e}", directory.display())
        });
    }

    let file = File::create(directory.join(log_file_name())).unwrap();
    let writer = BoxMakeWriter::new(file);
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]").unwrap(),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).expect(
        "Could not set global default tracing subscriber. \
         Consider skipping init_logger if you already install one.",
    );
}

fn log_file_name() -> String {
    let format =
        format_description::parse("arena_[year]-[month]-[day]_[hour][minute][second].log").unwrap();
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format).unwrap()
}
