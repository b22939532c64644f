//! Colored log output for the CLI.

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Configure logging: this crate at Info (Debug with `--verbose`),
/// dependencies capped at Warn. `RUST_LOG` still overrides both.
///
/// Warnings carry their module target because boundary escapes and skipped
/// paths are reported per stage and operators grep the output by stage.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME").cyan();
            let line = match record.level() {
                Level::Error => {
                    format!("[{} {}] {}", name, "ERROR".red().bold(), record.args())
                }
                Level::Warn => format!(
                    "[{} {} {}] {}",
                    name,
                    "WARN".yellow(),
                    record.target().white(),
                    record.args()
                ),
                Level::Debug | Level::Trace => {
                    format!("[{} {}] {}", name, record.target().dimmed(), record.args())
                }
                Level::Info => format!("[{}] {}", name, record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .init();
}
