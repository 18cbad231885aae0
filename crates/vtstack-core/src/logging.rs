#![forbid(unsafe_code)]

//! Event macros shared by every vtstack crate.
//!
//! With the `tracing` feature the five level macros are `tracing`'s own.
//! Without it they expand to a block that is never executed but still
//! names every field value and message argument, so locals captured only
//! for logging (`%err`, `changed`) type-check and count as used in both
//! builds. Nothing is evaluated at runtime.
//!
//! Spans are not shimmed: hot paths open them behind
//! `#[cfg(feature = "tracing")]` and call `tracing` directly.
//!
//! The accepted event grammar is the subset of `tracing` used in the
//! workspace: a comma separated list of `%ident`, `?ident`, `ident`,
//! `name = value`, `name = %value`, `name = ?value`, followed by an
//! optional format string with arguments.

#[cfg(feature = "tracing")]
pub use tracing::{debug, error, info, trace, warn};

/// Expands a `tracing` field list into borrows of each value.
#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __vtstack_event_fields {
    () => {};
    ($msg:literal $(, $arg:expr)* $(,)?) => {
        let _ = ::core::format_args!($msg $(, $arg)*);
    };
    (% $name:ident $(, $($rest:tt)*)?) => {
        let _ = &$name;
        $crate::__vtstack_event_fields!($($($rest)*)?);
    };
    (? $name:ident $(, $($rest:tt)*)?) => {
        let _ = &$name;
        $crate::__vtstack_event_fields!($($($rest)*)?);
    };
    ($field:ident = % $value:expr $(, $($rest:tt)*)?) => {
        let _ = &$value;
        $crate::__vtstack_event_fields!($($($rest)*)?);
    };
    ($field:ident = ? $value:expr $(, $($rest:tt)*)?) => {
        let _ = &$value;
        $crate::__vtstack_event_fields!($($($rest)*)?);
    };
    ($field:ident = $value:expr $(, $($rest:tt)*)?) => {
        let _ = &$value;
        $crate::__vtstack_event_fields!($($($rest)*)?);
    };
    ($name:ident $(, $($rest:tt)*)?) => {
        let _ = &$name;
        $crate::__vtstack_event_fields!($($($rest)*)?);
    };
}

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __vtstack_disabled_event {
    ($($fields:tt)*) => {
        if false {
            $crate::__vtstack_event_fields!($($fields)*);
        }
    };
}

/// Debug-level event; compiled out without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($fields:tt)*) => { $crate::__vtstack_disabled_event!($($fields)*) };
}

/// Error-level event; compiled out without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! error {
    ($($fields:tt)*) => { $crate::__vtstack_disabled_event!($($fields)*) };
}

/// Info-level event; compiled out without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! info {
    ($($fields:tt)*) => { $crate::__vtstack_disabled_event!($($fields)*) };
}

/// Trace-level event; compiled out without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! trace {
    ($($fields:tt)*) => { $crate::__vtstack_disabled_event!($($fields)*) };
}

/// Warn-level event; compiled out without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! warn {
    ($($fields:tt)*) => { $crate::__vtstack_disabled_event!($($fields)*) };
}

/// Install a JSON subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_directive` (e.g. `"vtstack_render=debug"`) when
/// `RUST_LOG` is unset or invalid. Output goes to stderr since stdout
/// belongs to the terminal. Returns `false` if a global subscriber was
/// already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_subscriber(default_directive: &str) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
