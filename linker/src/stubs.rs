//! Constant-return stand-ins. Imports and patched functions that the host has no use for
//! are pointed at one of these.

use std::ffi::c_int;

use shim_loader::Address;

pub extern "C" fn ret0() -> c_int {
    0
}

pub extern "C" fn ret1() -> c_int {
    1
}

pub fn ret0_address() -> Address {
    Address::of_fn(ret0 as *const ())
}

pub fn ret1_address() -> Address {
    Address::of_fn(ret1 as *const ())
}
