use shim_linker::{Binding, MissingPolicy, ResolutionTable, StubKind};
use shim_loader::Address;

use crate::hooks;
use crate::Result;

/// Imports implemented by the shim itself.
pub fn shim_imports() -> Vec<(&'static str, Binding)> {
    vec![
        ("__android_log_print", Binding::Bound(Address::of_fn(hooks::android_log_print as *const ()))),
        ("__sF", Binding::Bound(Address::of(hooks::STDIO_BLOCK.as_ptr()))),
        ("__stack_chk_guard", Binding::Bound(Address::of(hooks::STACK_CHK_GUARD.as_ptr()))),
        ("getcwd", Binding::Bound(Address::of_fn(hooks::getcwd as *const ()))),
        ("glNormalPointer", Binding::Stub(StubKind::Zero)),
        ("localtime", Binding::Bound(Address::of_fn(hooks::localtime as *const ()))),
        ("mkdir", Binding::Bound(Address::of_fn(hooks::mkdir as *const ()))),
        ("printf", Binding::Stub(StubKind::Zero)),
        ("rmdir", Binding::Bound(Address::of_fn(hooks::rmdir as *const ()))),
    ]
}

/// The full resolution table: the shim's own imports plus the native symbols the host
/// links in. A name provided by both is a construction error.
pub fn resolution_table<I>(native: I, missing: MissingPolicy) -> Result<ResolutionTable>
where
    I: IntoIterator<Item = (&'static str, Address)>,
{
    let native = native.into_iter().map(|(name, address)| (name, Binding::Bound(address)));

    Ok(ResolutionTable::new(shim_imports().into_iter().chain(native), missing)?)
}
