// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logging for Mirage.
//!
//! Everything in the crate logs through the `log` facade (usually via the
//! `*_fmt!` context macros in [`wrapper`]).  At startup one backend is
//! installed:
//!
//! - **env_logger** (default) – human readable lines on stderr;
//! - **slog** – when `logging.structured` is set, a terminal or JSON drain
//!   behind `slog-async`, with the `log` facade bridged in through
//!   `slog-stdlog`.

pub mod config;
pub mod middleware;
pub mod structured;
pub mod wrapper;


pub use config::LoggingConfig;
pub use middleware::RequestLogger;

use log::LevelFilter;
use once_cell::sync::OnceCell;
use slog::Logger;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use structured::LoggerGuard;

static INIT: Once = Once::new();
static USING_STRUCTURED: AtomicBool = AtomicBool::new(false);
static GLOBAL_GUARD: OnceCell<LoggerGuard> = OnceCell::new();

/// Initialize the default env_logger backend.
///
/// `RUST_LOG` still wins over `level` when set.  Only the first call in a
/// process has any effect.
pub fn init(level: Option<LevelFilter>) {
    INIT.call_once(|| init_env_logger(level.unwrap_or(LevelFilter::Info)));
}

/// Initialize logging from a [`LoggingConfig`].
///
/// `level` is the effective level, already resolved by the caller from the
/// environment and the configuration.  Only the first call in a process has
/// any effect.
pub fn init_with_config(level: LevelFilter, config: &LoggingConfig) {
    INIT.call_once(|| {
        if !config.structured {
            init_env_logger(level);
            return;
        }

        let mut logger_config = config.to_logger_config();
        logger_config.level = structured::slog_level(level);
        let guard = structured::init_global_logger(&logger_config);

        let bridged = match level.to_level() {
            Some(max) => slog_stdlog::init_with_level(max).is_ok(),
            None => {
                log::set_max_level(LevelFilter::Off);
                true
            }
        };

        if bridged {
            USING_STRUCTURED.store(true, Ordering::SeqCst);
            let _ = GLOBAL_GUARD.set(guard);
            log::info!("Structured logging initialized at level: {}", level);
        } else {
            // Another `log` backend is already installed; keep using it.
            drop(guard);
        }
    });
}

fn init_env_logger(level: LevelFilter) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", level.to_string().to_lowercase());

    let installed = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_target(true)
        .try_init()
        .is_ok();

    if installed {
        log::info!("Logging initialized at level: {}", log::max_level());
    }
}

/// Returns true once the slog backend has been installed.
pub fn is_structured_logging() -> bool {
    USING_STRUCTURED.load(Ordering::SeqCst)
}

/// Log `message` with key/value `fields`.
///
/// With the structured backend the fields become slog key/values; otherwise
/// they are appended to the message.
pub fn log_with_context(
    level: log::Level,
    context: &str,
    message: &str,
    fields: &[(&'static str, String)],
) {
    if is_structured_logging() {
        let logger = add_fields_to_logger(slog_scope::logger(), fields)
            .new(slog::o!("context" => context.to_string()));
        match level {
            log::Level::Error => slog::error!(logger, "{}", message),
            log::Level::Warn => slog::warn!(logger, "{}", message),
            log::Level::Info => slog::info!(logger, "{}", message),
            log::Level::Debug => slog::debug!(logger, "{}", message),
            log::Level::Trace => slog::trace!(logger, "{}", message),
        }
        return;
    }

    let rendered: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
    if rendered.is_empty() {
        log::log!(level, "[{}] {}", context, message);
    } else {
        log::log!(level, "[{}] {} ({})", context, message, rendered.join(" "));
    }
}

/// Attach `fields` to a child of `logger`.
pub fn add_fields_to_logger(logger: Logger, fields: &[(&'static str, String)]) -> Logger {
    fields
        .iter()
        .fold(logger, |logger, (key, value)| logger.new(slog::o!(*key => value.clone())))
}
