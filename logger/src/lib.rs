//! This crate provides a tracing subscriber configuration that works with the host
//! application's logging setup.
//!
//! The host owns the actual log sink (a debug file, a console, whatever it has), so the
//! shim never writes logs itself. Instead this crate installs a custom
//! `tracing_subscriber::Layer` that formats each event and passes it back over the
//! FFI boundary, filtered through a set of "containers" the host registers up-front.
//!
//! Ultimately this should mean no log fragmentation: the loader, the bridges and the
//! foreign module's own log calls all land in the same place.

use std::sync::{Arc, Once, RwLock};

use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_subscriber::prelude::*;

mod layer;
pub use layer::{convert_host_log_level_to_tracing_level, ForeignLoggerFn, HostLoggerLayer};

/// A marker for where logs should be routed to.
///
/// Rust enum variants can't be strings, but the tracing macro `target` field requires a
/// static str. So we fake things a bit and expose a module keyed accordingly; the syntax
/// at call sites is the same as if this were an enum.
///
/// If you add a new target here, the host needs to register a container for it or its
/// events will be dropped.
#[allow(non_upper_case_globals)]
pub mod Log {
    /// The default target for anything that doesn't fit elsewhere.
    pub const General: &'static str = "shim_general";

    /// Loading, relocation and the lifecycle state machine.
    pub const Loader: &'static str = "shim_loader";

    /// Import resolution and patching.
    pub const Linker: &'static str = "shim_linker";

    /// The input bridge.
    pub const Input: &'static str = "shim_input";

    /// The audio bridge.
    pub const Audio: &'static str = "shim_audio";

    /// Messages the foreign module prints through its own logging import.
    pub const Module: &'static str = "shim_module";
}

/// Per-target routing state, registered by the host.
#[derive(Debug)]
pub(crate) struct LogContainer {
    pub kind: String,
    pub is_enabled: bool,
    pub level: Level,
}

/// A global stack of `LogContainer`s.
///
/// Registrations (which require `write`) happen up-front during host startup. The
/// RwLock gives the logging threads parallel reader access after that.
pub(crate) static LOG_CONTAINERS: OnceCell<Arc<RwLock<Vec<LogContainer>>>> = OnceCell::new();

fn containers() -> &'static Arc<RwLock<Vec<LogContainer>>> {
    LOG_CONTAINERS.get_or_init(|| Arc::new(RwLock::new(Vec::new())))
}

/// Installs the global subscriber that forwards into `logger_fn`.
///
/// *Usually* a library should not install a global subscriber, but the shim is the
/// application as far as the host is concerned, and we *want* a global one here.
pub fn init(logger_fn: ForeignLoggerFn) {
    let _containers = containers();

    // A guard so that we don't double-init logging layers.
    static LOGGER: Once = Once::new();

    // `init` rather than `try_init`: if something else registered before us we want
    // to know about it.
    LOGGER.call_once(|| {
        tracing_subscriber::registry().with(HostLoggerLayer::new(logger_fn)).init();
    });
}

/// Registers a container for `kind`, or updates it if one already exists.
pub fn register_container(kind: &str, is_enabled: bool, level: Level) {
    let mut writer = match containers().write() {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!("Unable to acquire write lock on log containers: {:?}", e);
            return;
        },
    };

    match writer.iter_mut().find(|container| container.kind == kind) {
        Some(container) => {
            container.is_enabled = is_enabled;
            container.level = level;
        },

        None => writer.push(LogContainer { kind: kind.to_string(), is_enabled, level }),
    }
}

/// Sets a registered container to a new enabled state and level. Unknown kinds are
/// ignored; the host is expected to register before it updates.
pub fn update_container(kind: &str, is_enabled: bool, level: Level) {
    let Ok(mut writer) = containers().write() else {
        return;
    };

    if let Some(container) = writer.iter_mut().find(|container| container.kind == kind) {
        container.is_enabled = is_enabled;
        container.level = level;
    }
}

/// Whether an event at `level` for `target` would be forwarded to the host.
///
/// In tracing, ERROR is the *lowest* level, so an event passes when it is at or below the
/// container's level.
pub fn is_enabled(target: &str, level: Level) -> bool {
    let Some(containers) = LOG_CONTAINERS.get() else {
        return false;
    };

    let Ok(reader) = containers.read() else {
        return false;
    };

    reader
        .iter()
        .find(|container| container.kind == target)
        .map_or(false, |container| container.is_enabled && level <= container.level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_target_is_disabled() {
        assert!(!is_enabled("shim_test_unregistered", Level::ERROR));
    }

    #[test]
    fn container_level_filters_more_verbose_events() {
        register_container("shim_test_levels", true, Level::INFO);

        assert!(is_enabled("shim_test_levels", Level::ERROR));
        assert!(is_enabled("shim_test_levels", Level::INFO));
        assert!(!is_enabled("shim_test_levels", Level::DEBUG));
    }

    #[test]
    fn update_can_disable_a_container() {
        register_container("shim_test_update", true, Level::TRACE);
        update_container("shim_test_update", false, Level::TRACE);

        assert!(!is_enabled("shim_test_update", Level::ERROR));
    }

    #[test]
    fn registering_twice_updates_in_place() {
        register_container("shim_test_twice", true, Level::WARN);
        register_container("shim_test_twice", true, Level::DEBUG);

        let reader = containers().read().unwrap();
        let count = reader.iter().filter(|c| c.kind == "shim_test_twice").count();
        assert_eq!(count, 1);
        drop(reader);

        assert!(is_enabled("shim_test_twice", Level::DEBUG));
    }
}
