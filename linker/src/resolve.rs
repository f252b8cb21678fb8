use std::collections::HashMap;

use shim_loader::{Address, SymbolBinding};
use shim_logger::Log;

use crate::stubs;
use crate::ResolveError;

/// Which constant a silent stub returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubKind {
    Zero,
    One,
}

impl StubKind {
    fn address(self) -> Address {
        match self {
            StubKind::Zero => stubs::ret0_address(),
            StubKind::One => stubs::ret1_address(),
        }
    }
}

/// What a table entry binds its name to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Bound(Address),
    Stub(StubKind),
}

/// What to do with an import the table has no entry for. One policy covers the whole
/// process; there are no per-symbol overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    #[default]
    Fatal,
    StubZero,
    StubOne,
}

/// The outcome for a single import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Bound(Address),
    StubbedZero,
    StubbedOne,
    Fatal,
}

impl ImportOutcome {
    fn address(self) -> Option<Address> {
        match self {
            ImportOutcome::Bound(address) => Some(address),
            ImportOutcome::StubbedZero => Some(StubKind::Zero.address()),
            ImportOutcome::StubbedOne => Some(StubKind::One.address()),
            ImportOutcome::Fatal => None,
        }
    }
}

impl From<Binding> for ImportOutcome {
    fn from(binding: Binding) -> Self {
        match binding {
            Binding::Bound(address) => ImportOutcome::Bound(address),
            Binding::Stub(StubKind::Zero) => ImportOutcome::StubbedZero,
            Binding::Stub(StubKind::One) => ImportOutcome::StubbedOne,
        }
    }
}

impl From<MissingPolicy> for ImportOutcome {
    fn from(policy: MissingPolicy) -> Self {
        match policy {
            MissingPolicy::Fatal => ImportOutcome::Fatal,
            MissingPolicy::StubZero => ImportOutcome::StubbedZero,
            MissingPolicy::StubOne => ImportOutcome::StubbedOne,
        }
    }
}

/// Maps the names the module imports to host implementations.
///
/// Built once at startup from a literal list; names are unique and matched exactly
/// (case-sensitive, no versions, no wildcards).
#[derive(Debug)]
pub struct ResolutionTable {
    entries: HashMap<&'static str, Binding>,
    missing: MissingPolicy,
}

impl ResolutionTable {
    /// Builds the table, rejecting any name that appears twice.
    pub fn new<I>(entries: I, missing: MissingPolicy) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = (&'static str, Binding)>,
    {
        let mut table = HashMap::new();

        for (name, binding) in entries {
            if table.insert(name, binding).is_some() {
                return Err(ResolveError::DuplicateSymbol(name));
            }
        }

        tracing::debug!(target: Log::Linker, entries = table.len(), ?missing, "Built resolution table");

        Ok(Self { entries: table, missing })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn missing_policy(&self) -> MissingPolicy {
        self.missing
    }

    /// The outcome for `name`: its table entry if there is one, otherwise the missing
    /// policy.
    pub fn outcome(&self, name: &str) -> ImportOutcome {
        match self.entries.get(name) {
            Some(binding) => (*binding).into(),
            None => self.missing.into(),
        }
    }

    /// The address `name` is explicitly bound to. Stubs and missing names yield `None`.
    pub fn lookup(&self, name: &str) -> Option<Address> {
        match self.entries.get(name) {
            Some(Binding::Bound(address)) => Some(*address),
            _ => None,
        }
    }

    /// Produces a binding for every import, or fails listing every import whose outcome
    /// is fatal.
    pub fn resolve<S: AsRef<str>>(&self, imports: &[S]) -> Result<Vec<SymbolBinding>, ResolveError> {
        let mut bindings = Vec::with_capacity(imports.len());
        let mut unresolved = Vec::new();

        for name in imports.iter().map(AsRef::as_ref) {
            let outcome = self.outcome(name);

            match outcome.address() {
                Some(address) => {
                    if !matches!(outcome, ImportOutcome::Bound(_)) {
                        tracing::debug!(target: Log::Linker, name, ?outcome, "Stubbing import");
                    }

                    bindings.push(SymbolBinding { name: name.to_string(), address });
                },

                None => unresolved.push(name.to_string()),
            }
        }

        if !unresolved.is_empty() {
            return Err(ResolveError::Unresolved(unresolved));
        }

        tracing::info!(target: Log::Linker, imports = bindings.len(), "Resolved imports");

        Ok(bindings)
    }
}
