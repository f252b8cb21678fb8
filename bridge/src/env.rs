use std::ffi::{c_int, c_void};
use std::mem::size_of;

use shim_logger::Log;

use crate::host::AudioSink;

/// A stand-in for the runtime context object the module's audio entry point expects as
/// its first argument.
///
/// The module treats the pointer it gets as a pointer to a function table pointer, and
/// only ever calls one entry of that table: "copy N samples out of this buffer". So the
/// block points at itself, and the one slot the module reads holds
/// [`set_short_array_region`]. Every other byte is filled with a recognizable sentinel;
/// a module that calls any other slot jumps to `0x41414141`.
///
/// The host sink sits directly after the block, so the delivery function finds it from
/// the `env` pointer the module passes back in.
#[repr(C)]
pub struct FakeEnv {
    block: [u8; FakeEnv::SIZE],
    sink: Box<dyn AudioSink>,
}

impl FakeEnv {
    pub const SIZE: usize = 0x1000;
    pub const SENTINEL: u8 = b'A';

    /// Holds the block's own address.
    pub const SELF_SLOT: usize = 0x000;

    /// Holds the audio delivery function.
    pub const DELIVER_SLOT: usize = 0x348;

    /// Builds the block on the heap. The returned box must not be dropped while the module
    /// may still call through it, which in practice means never.
    pub fn new(sink: Box<dyn AudioSink>) -> Box<Self> {
        let mut env = Box::new(Self { block: [Self::SENTINEL; Self::SIZE], sink });

        let own_address = env.as_ptr() as usize;
        env.write_slot(Self::SELF_SLOT, own_address);
        env.write_slot(Self::DELIVER_SLOT, set_short_array_region as *const () as usize);

        tracing::debug!(target: Log::Audio, address = own_address, "Built fake runtime context");

        env
    }

    /// The pointer handed to the module.
    pub fn as_ptr(&self) -> *const c_void {
        self as *const Self as *const c_void
    }

    /// Reads a pointer-sized slot of the block.
    pub fn slot(&self, offset: usize) -> usize {
        let mut raw = [0u8; size_of::<usize>()];
        raw.copy_from_slice(&self.block[offset..offset + size_of::<usize>()]);
        usize::from_ne_bytes(raw)
    }

    /// The raw block as the module sees it.
    pub fn block(&self) -> &[u8; Self::SIZE] {
        &self.block
    }

    fn write_slot(&mut self, offset: usize, value: usize) {
        self.block[offset..offset + size_of::<usize>()].copy_from_slice(&value.to_ne_bytes());
    }
}

impl std::fmt::Debug for FakeEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeEnv")
            .field("address", &self.as_ptr())
            .field("deliver", &format_args!("{:#x}", self.slot(Self::DELIVER_SLOT)))
            .finish()
    }
}

/// The delivery function the module finds at [`FakeEnv::DELIVER_SLOT`]. Mirrors the
/// shape of the platform's "set short array region" call: the array handle and start
/// offset are meaningless here and ignored.
///
/// # Safety
///
/// `env` must be a pointer obtained from [`FakeEnv::as_ptr`] on a live block, and `buf`
/// must be valid for `len` samples.
pub unsafe extern "C" fn set_short_array_region(
    env: *const FakeEnv,
    _array: c_int,
    _start: c_int,
    len: c_int,
    buf: *const i16,
) {
    if env.is_null() || buf.is_null() || len <= 0 {
        return;
    }

    let env = &*env;
    let samples = std::slice::from_raw_parts(buf, len as usize);

    env.sink.output(samples);
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<Vec<i16>>>>);

    impl AudioSink for RecordingSink {
        fn output(&self, samples: &[i16]) {
            self.0.lock().unwrap().push(samples.to_vec());
        }
    }

    type DeliverFn = unsafe extern "C" fn(*const FakeEnv, c_int, c_int, c_int, *const i16);

    #[test]
    fn block_points_at_itself() {
        let env = FakeEnv::new(Box::new(RecordingSink::default()));

        assert_eq!(env.slot(FakeEnv::SELF_SLOT), env.as_ptr() as usize);
        assert_eq!(env.slot(FakeEnv::DELIVER_SLOT), set_short_array_region as *const () as usize);
    }

    #[test]
    fn unused_slots_hold_the_sentinel() {
        let env = FakeEnv::new(Box::new(RecordingSink::default()));
        let width = size_of::<usize>();

        let sentinel_bytes = env
            .block()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i >= width && !(FakeEnv::DELIVER_SLOT..FakeEnv::DELIVER_SLOT + width).contains(i))
            .all(|(_, b)| *b == b'A');

        assert!(sentinel_bytes);
        assert_eq!(env.slot(0x100), usize::from_ne_bytes([b'A'; size_of::<usize>()]));
    }

    #[test]
    fn module_style_call_reaches_the_sink() {
        let sink = RecordingSink::default();
        let env = FakeEnv::new(Box::new(sink.clone()));
        let samples = [1i16, -1, 2, -2];

        // Walk the pointers the way the module does: env -> table -> slot.
        unsafe {
            let env_ptr = env.as_ptr() as *const usize;
            let table = *env_ptr as *const u8;
            let deliver = *(table.add(FakeEnv::DELIVER_SLOT) as *const usize);
            let deliver: DeliverFn = std::mem::transmute(deliver);

            deliver(env_ptr as *const FakeEnv, 0, 0, samples.len() as c_int, samples.as_ptr());
        }

        assert_eq!(*sink.0.lock().unwrap(), vec![vec![1, -1, 2, -2]]);
    }

    #[test]
    fn empty_delivery_is_ignored() {
        let sink = RecordingSink::default();
        let env = FakeEnv::new(Box::new(sink.clone()));

        unsafe {
            set_short_array_region(&*env, 0, 0, 0, [0i16; 1].as_ptr());
            set_short_array_region(&*env, 0, 0, 4, std::ptr::null());
        }

        assert!(sink.0.lock().unwrap().is_empty());
    }
}
