//! Logging macros and subscriber setup shared by every burrow crate.
//!
//! Events are emitted inside a short-lived span naming the subsystem that
//! produced them (`internal`, `spool`, `mailbox`), so the compact formatter
//! prints e.g. `spool: Published 01J...` without each call site having to
//! build its own span.

use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg),*)
    }};
}

#[macro_export]
macro_rules! spool {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "spool", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::spool!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! mailbox {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "mailbox", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::mailbox!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

const fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

/// Parse a `LOG_LEVEL` value, returning `None` when it is not a level name.
fn parse_level(value: &str) -> Option<LevelFilter> {
    LevelFilter::from_str(value.trim()).ok()
}

/// Install the global subscriber.
///
/// The level is read from `LOG_LEVEL`; an unknown value is reported on stderr
/// and replaced with the build default. Only `burrow*` targets are emitted.
///
/// Calling this more than once is harmless: later calls leave the first
/// subscriber in place.
pub fn init() {
    let default = default_level();

    let level = std::env::var("LOG_LEVEL").map_or(default, |level| {
        parse_level(&level).unwrap_or_else(|| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    });

    let _ = tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("burrow")
                })),
        )
        .try_init();
}
