//! Flat error codes returned by translation-table operations.

/// Failure outcomes for a translation-table operation.
///
/// Kept as a flat, `Copy` enum rather than a richer error type: callers
/// (hypervisor fault handlers) branch on the kind, they don't need a
/// chain of causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgtError {
    /// Virtual/intermediate address is outside the controller's configured range.
    AddrInvalid,
    /// The requested range wraps past the top of the address space.
    AddrOverflow,
    /// Address or size is not aligned to the operation's granularity.
    ArgumentAlignment,
    /// An argument combination is structurally invalid (e.g. zero size).
    ArgumentInvalid,
    /// The table allocator could not supply a new table.
    NoMem,
    /// `map` would overwrite a different, already-present mapping.
    ExistingMapping,
    /// An internal invariant was violated (corrupt descriptor, walker desync).
    Failure,
}
