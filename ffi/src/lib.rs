//! The C interface of the shim, and the only crate the host links.
//!
//! The host's startup code sets up logging through the `shim_logging_*` functions, then
//! calls [`shim_run`] with the loader's function table and its own. From there the shim
//! owns the process: `shim_run` only returns if startup fails.
//!
//! This library auto-generates a C header on build (see `build.rs`).

use std::ffi::{c_char, c_int, CStr};

use shim_loader::{ForeignLoader, ForeignLoaderFns};
use shim_logger::Log;
use shim_runtime::{Config, Context, Running, StartupError};

mod host;
pub use host::ForeignHostFns;
use host::{HostAudio, HostInput, HostPresenter};

mod imports;

/// Installs the tracing subscriber that forwards into the host's log function. See
/// `shim_logger::init`.
///
/// `logger_fn` can't be type-aliased here, otherwise cbindgen mangles the header. The
/// function type is:
///
/// ```text
/// void Log(int level, const char *file, int line, const char *msg);
/// ```
#[no_mangle]
pub extern "C" fn shim_logging_init(logger_fn: unsafe extern "C" fn(c_int, *const c_char, c_int, *const c_char)) {
    shim_logger::init(logger_fn);
}

/// Registers a log container for one of the `Log` targets.
#[no_mangle]
pub extern "C" fn shim_logging_register_container(kind: *const c_char, is_enabled: bool, level: c_int) {
    let kind = c_str_to_string(kind, "shim_logging_register_container", "kind");
    let level = shim_logger::convert_host_log_level_to_tracing_level(level);

    shim_logger::register_container(&kind, is_enabled, level);
}

/// Updates a registered log container.
#[no_mangle]
pub extern "C" fn shim_logging_update_container(kind: *const c_char, is_enabled: bool, level: c_int) {
    let kind = c_str_to_string(kind, "shim_logging_update_container", "kind");
    let level = shim_logger::convert_host_log_level_to_tracing_level(level);

    shim_logger::update_container(&kind, is_enabled, level);
}

/// Loads, links, patches and starts the module, then runs the render loop on the calling
/// thread forever.
///
/// `data_path` may be null to use the default data directory. On a startup failure the
/// diagnostic goes to `host_fns.report_fatal` and this returns -1; a null table also
/// returns -1.
#[no_mangle]
pub extern "C" fn shim_run(
    data_path: *const c_char,
    loader_fns: *const ForeignLoaderFns,
    host_fns: *const ForeignHostFns,
) -> c_int {
    // The host hands over tables it keeps alive for the life of the process.
    let Some(host) = (unsafe { host_fns.as_ref() }).copied() else {
        tracing::error!(target: Log::General, "shim_run called without host functions");
        return -1;
    };

    let Some(loader) = (unsafe { loader_fns.as_ref() }).copied() else {
        host.report_fatal("No loader functions were provided.");
        return -1;
    };

    let config = match data_path.is_null() {
        true => Config::default(),
        false => Config::with_data_path(c_str_to_string(data_path, "shim_run", "data_path")),
    };

    match start(config, loader, host) {
        Ok(running) => running.run(),

        Err(e) => {
            tracing::error!(target: Log::General, error = ?e, "Startup failed");
            host.report_fatal(&e.to_string());
            -1
        },
    }
}

fn start(config: Config, loader: ForeignLoaderFns, host: ForeignHostFns) -> Result<Running<HostPresenter>, StartupError> {
    tracing::info!(target: Log::General, module = %config.module_path(), "Starting");

    let context = Context::install(config)?;

    shim_runtime::startup(
        ForeignLoader::new(loader),
        context,
        imports::native_imports(),
        HostInput::new(host),
        HostAudio::new(host),
        HostPresenter::new(host),
    )
}

/// Converts a C string from the host into an owned `String`, or an empty one if it is
/// null or not UTF-8.
pub(crate) fn c_str_to_string(string: *const c_char, fn_name: &str, param_name: &str) -> String {
    if string.is_null() {
        tracing::error!(target: Log::General, "[{}] {} is null, will be blank", fn_name, param_name);
        return String::new();
    }

    // The host owns the string and keeps it alive for the duration of the call.
    let slice = unsafe { CStr::from_ptr(string) };

    match slice.to_str() {
        Ok(value) => value.to_string(),

        Err(e) => {
            tracing::error!(
                target: Log::General,
                error = ?e,
                "[{}] Failed to bridge {}, will be blank",
                fn_name,
                param_name
            );

            String::new()
        },
    }
}
