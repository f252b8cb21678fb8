//! This module implements a custom `tracing_subscriber::Layer` that hands formatted
//! events to the host's log callback.

use std::ffi::CString;
use std::fmt::Write;
use std::os::raw::{c_char, c_int};

use tracing::Level;
use tracing_subscriber::Layer;

/// Host `NOTICE` level. Nothing in tracing maps onto it.
#[allow(dead_code)]
const LOG_LEVEL_NOTICE: c_int = 1;

/// Host `ERROR` level.
const LOG_LEVEL_ERROR: c_int = 2;

/// Host `WARNING` level.
const LOG_LEVEL_WARNING: c_int = 3;

/// Host `INFO` level.
const LOG_LEVEL_INFO: c_int = 4;

/// Host `DEBUG` level.
const LOG_LEVEL_DEBUG: c_int = 5;

/// Converts a host log level into a `tracing::Level`.
pub fn convert_host_log_level_to_tracing_level(level: c_int) -> Level {
    match level {
        LOG_LEVEL_ERROR => Level::ERROR,
        LOG_LEVEL_WARNING => Level::WARN,
        LOG_LEVEL_INFO => Level::INFO,
        _ => Level::DEBUG,
    }
}

fn convert_tracing_level_to_host_log_level(level: Level) -> c_int {
    match level {
        Level::ERROR => LOG_LEVEL_ERROR,
        Level::WARN => LOG_LEVEL_WARNING,
        Level::INFO => LOG_LEVEL_INFO,
        Level::DEBUG | Level::TRACE => LOG_LEVEL_DEBUG,
    }
}

/// A function over on the host side. The shim is linked into the host as a static
/// library and can't name the host's logging functions directly, but the host _can_
/// pass in a callback.
///
/// This should correspond to:
///
/// ```c
/// void LogFn(int level, const char *filename, int line_number, const char *msg);
/// ```
pub type ForeignLoggerFn = unsafe extern "C" fn(c_int, *const c_char, c_int, *const c_char);

/// A tracing layer that forwards events into the host logging infrastructure.
#[derive(Debug)]
pub struct HostLoggerLayer {
    logger_fn: ForeignLoggerFn,
}

impl HostLoggerLayer {
    /// Creates and returns a new logger layer.
    pub fn new(logger_fn: ForeignLoggerFn) -> Self {
        Self { logger_fn }
    }
}

impl<S> Layer<S> for HostLoggerLayer
where
    S: tracing::Subscriber,
{
    /// Unpacks a tracing event and routes it to the host log handler, provided the
    /// container for its target is enabled at that level.
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();

        // Bail before allocating anything if the host doesn't want this event.
        if !crate::is_enabled(metadata.target(), level) {
            return;
        }

        let mut visitor = HostLoggerVisitor::new();
        event.record(&mut visitor);

        let c_str_msg = match CString::new(visitor.finish()) {
            Ok(msg) => msg,

            // This should never happen, but on the off chance it does, dump it to stderr.
            Err(e) => {
                eprintln!("Failed to convert log msg to CString: {:?}", e);
                return;
            },
        };

        let c_filename = match CString::new(metadata.file().unwrap_or_else(|| "")) {
            Ok(filename) => filename,
            Err(e) => {
                eprintln!("Failed to convert filename to CString: {:?}", e);
                return;
            },
        };

        let line_number = metadata.line().unwrap_or_else(|| 0);

        // The host copies what it needs out of both strings before returning, so the
        // CStrings can drop at the end of this scope.
        unsafe {
            (self.logger_fn)(
                convert_tracing_level_to_host_log_level(level),
                c_filename.as_ptr(),
                line_number.try_into().unwrap_or_else(|_| 0),
                c_str_msg.as_ptr(),
            );
        }
    }
}

/// Builds the single line of text the host receives for an event. The `message` field
/// leads, every other field follows as `name=value`.
#[derive(Debug, Default)]
struct HostLoggerVisitor {
    message: String,
    fields: String,
}

impl HostLoggerVisitor {
    fn new() -> Self {
        Self::default()
    }

    fn finish(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }

        format!("{} {}", self.message, self.fields.trim_end())
    }

    fn push(&mut self, field: &tracing::field::Field, value: impl std::fmt::Display) {
        let result = if field.name() == "message" {
            write!(&mut self.message, "{}", value)
        } else {
            write!(&mut self.fields, "{}={} ", field.name(), value)
        };

        if let Err(e) = result {
            eprintln!("Failed to record field {}: {:?}", field.name(), e);
        }
    }
}

impl tracing::field::Visit for HostLoggerVisitor {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.push(field, value);
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push(field, value);
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push(field, value);
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push(field, value);
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push(field, value);
    }

    fn record_error(&mut self, field: &tracing::field::Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value);
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push(field, format_args!("{:?}", value));
    }
}
