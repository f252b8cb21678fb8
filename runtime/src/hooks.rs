//! Host functions the module ends up calling, either because an import was bound to them
//! or because one of its own functions was patched to jump here.
//!
//! All of these run on whichever module thread called them and must not panic.

use std::cell::UnsafeCell;
use std::ffi::{c_char, c_int, CStr};
use std::ptr;
use std::sync::atomic::AtomicU32;

use shim_logger::Log;

use crate::Context;

/// The directory the module reads from and writes to.
pub extern "C" fn get_app_path() -> *const c_char {
    match Context::get() {
        Some(context) => context.data_path().as_ptr(),
        None => ptr::null(),
    }
}

pub extern "C" fn enable_sound() {
    if let Some(context) = Context::get() {
        context.mute().unmute();
    }
}

pub extern "C" fn disable_sound() {
    if let Some(context) = Context::get() {
        context.mute().mute();
    }
}

/// Layout of the module's path object. Only `path` is read.
#[repr(C)]
#[derive(Debug)]
pub struct ModulePath {
    pub vtable: *const (),
    pub path: *const c_char,
    pub path_len: usize,
}

/// Replaces the module's "is this path the filesystem root" check, which doesn't know the
/// host's root.
///
/// # Safety
///
/// `this` must point at a pointer to a live `ModulePath` whose `path` is NUL terminated.
pub unsafe extern "C" fn path_is_root(this: *const *const ModulePath) -> c_int {
    let Some(context) = Context::get() else {
        return 0;
    };

    if this.is_null() || (*this).is_null() || (**this).path.is_null() {
        return 0;
    }

    let path = CStr::from_ptr((**this).path);
    (path == context.root_path().as_c_str()) as c_int
}

/// The module's logging goes into the `Module` target. Only the format string is logged;
/// the arguments are not expanded.
///
/// # Safety
///
/// `tag` and `fmt` must be null or NUL terminated.
pub unsafe extern "C" fn android_log_print(prio: c_int, tag: *const c_char, fmt: *const c_char) -> c_int {
    let tag = lossy(tag);
    let message = lossy(fmt);
    let message = message.trim_end();

    match prio {
        p if p >= 6 => tracing::error!(target: Log::Module, tag = %tag, "{}", message),
        5 => tracing::warn!(target: Log::Module, tag = %tag, "{}", message),
        4 => tracing::info!(target: Log::Module, tag = %tag, "{}", message),
        3 => tracing::debug!(target: Log::Module, tag = %tag, "{}", message),
        _ => tracing::trace!(target: Log::Module, tag = %tag, "{}", message),
    }

    0
}

unsafe fn lossy<'a>(s: *const c_char) -> std::borrow::Cow<'a, str> {
    if s.is_null() {
        return "".into();
    }

    CStr::from_ptr(s).to_string_lossy()
}

/// The module has no working directory; it always sees an empty one.
///
/// # Safety
///
/// `buf` must be null or valid for `size` bytes.
pub unsafe extern "C" fn getcwd(buf: *mut c_char, size: usize) -> *mut c_char {
    if buf.is_null() || size == 0 {
        return ptr::null_mut();
    }

    *buf = 0;
    buf
}

/// # Safety
///
/// `path` must be NUL terminated.
pub unsafe extern "C" fn mkdir(path: *const c_char, mode: libc::mode_t) -> c_int {
    match libc::mkdir(path, mode) {
        code if code < 0 => -1,
        _ => 0,
    }
}

/// # Safety
///
/// `path` must be NUL terminated.
pub unsafe extern "C" fn rmdir(path: *const c_char) -> c_int {
    match libc::rmdir(path) {
        code if code < 0 => -1,
        _ => 0,
    }
}

/// The module sometimes asks for the local time of a timer it never set. When conversion
/// fails, the timer is refreshed with the current time and converted again.
///
/// # Safety
///
/// `timer` must be null or point at a writable `time_t`.
pub unsafe extern "C" fn localtime(timer: *mut libc::time_t) -> *mut libc::tm {
    if timer.is_null() {
        return ptr::null_mut();
    }

    let converted = libc::localtime(timer);
    if !converted.is_null() {
        return converted;
    }

    tracing::debug!(target: Log::Module, timer = *timer, "Retrying localtime with the current time");

    libc::time(timer);
    libc::localtime(timer)
}

/// Stack protector canary the module compares against.
pub static STACK_CHK_GUARD: AtomicU32 = AtomicU32::new(0x4242_4242);

/// Backing memory for the module's stdio `FILE` array. The module only takes the address
/// of its entries; it never performs real stdio through them.
#[repr(C, align(8))]
pub struct StdioBlock(UnsafeCell<[u8; StdioBlock::LEN]>);

impl StdioBlock {
    /// Three generously sized `FILE` records.
    pub const LEN: usize = 3 * 0x100;

    const fn zeroed() -> Self {
        Self(UnsafeCell::new([0; Self::LEN]))
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.0.get() as *const u8
    }
}

// The host never touches the contents; only the module does.
unsafe impl Sync for StdioBlock {}

pub static STDIO_BLOCK: StdioBlock = StdioBlock::zeroed();
