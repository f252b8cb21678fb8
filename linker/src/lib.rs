//! Binds the foreign module to the host: resolves what it imports, and patches what it
//! defines but shouldn't run.
//!
//! Both halves work against an already-relocated module through the traits in
//! `shim_loader`. Resolution never touches module memory itself (it produces bindings
//! for the loader to write), while patching writes code and data directly and then
//! requires exactly one instruction cache flush before anything patched may run.

pub mod arm;

mod errors;
pub use errors::{PatchError, ResolveError};

mod patch;
pub use patch::{DataPatch, Encoding, FunctionHook, PatchBatch, PendingFlush};

mod resolve;
pub use resolve::{Binding, ImportOutcome, MissingPolicy, ResolutionTable, StubKind};

pub mod stubs;
