//! Log setup for the companion process

use chrono::Local;
use log::LevelFilter;
use std::io::Write;

/// Installs the global logger at `level`. `RUST_LOG`, when set, takes
/// precedence. Every line is stamped with local RFC 3339 time.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
}
