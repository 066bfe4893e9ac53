//! Error types for every layer of the shuffle-thunk machinery.
//!
//! Planning errors indicate a defect in the caller's layout computation and
//! are never recovered from locally. Resource errors are fatal to the request
//! that hit them but leave previously compiled stubs intact.

use thiserror::Error;

/// A [`Location`] that does not fit the packed record format.
///
/// [`Location`]: crate::shuffle::Location
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("stack offset {0:#x} does not fit in 15 bits")]
    StackOffset(u32),
    #[error("register index {0:#x} is out of range")]
    RegisterIndex(u16),
    #[error("floating-point register index {0:#x} aliases a reserved encoding")]
    FloatRegisterIndex(u16),
    #[error("stack size delta {0} does not fit in 16 bits")]
    StackDelta(i32),
}

/// Raw bytes that are not a well-formed shuffle array.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("shuffle array has no sentinel record")]
    Unterminated,
    #[error("record {record} has invalid location encoding {bits:#06x}")]
    BadLocation { record: usize, bits: u16 },
    #[error("record {record} uses the sentinel as a destination")]
    SentinelDestination { record: usize },
}

/// Failure to compute an argument layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("argument {index} is a zero-sized aggregate")]
    EmptyAggregate { index: usize },
    #[error("argument {index}: aggregate of {size} bytes needs {expected} eightbyte classes, got {actual}")]
    AggregateClasses { index: usize, size: u16, expected: usize, actual: usize },
    #[error("argument {index}: sub-word size {size} is not 1, 2 or 4")]
    SubWordSize { index: usize, size: u8 },
    #[error("argument stack area exceeds {0:#x} bytes")]
    StackOverflow(u32),
}

/// The Shuffle Plan Builder could not produce a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("layouts cannot be reconciled: {0}")]
    Unreconcilable(String),
    #[error("destination {0} is written by more than one record")]
    DuplicateDestination(String),
    #[error("relocation cycle cannot be resolved with one helper register")]
    UnbreakableCycle,
    #[error("destination frame needs {required} stack bytes but the source provides only {available}")]
    StackGrowth { available: u16, required: u16 },
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// The code-emission service could not produce an adapter.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("executable memory allocation failed: {0}")]
    Allocation(#[from] std::io::Error),
    #[error("cannot encode adapter: {0}")]
    Encoding(String),
}

/// The Thunk Cache could not return a stub.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("malformed shuffle array: {0}")]
    Malformed(#[from] DecodeError),
    #[error("executable memory allocation failed: {0}")]
    Allocation(std::io::Error),
    #[error("adapter emission failed for a well-formed shuffle array: {0}")]
    Emission(String),
}

impl From<EmitError> for CompileError {
    fn from(e: EmitError) -> Self {
        match e {
            EmitError::Allocation(e) => CompileError::Allocation(e),
            EmitError::Encoding(message) => CompileError::Emission(message),
        }
    }
}

/// A delegate binding request that the binding policy rejects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("no method named `{name}` can be bound under the requested policy")]
    NoMatchingMethod { name: String },
    #[error("cannot bind instance method `{name}` to a null target")]
    NullTarget { name: String },
}

/// The single failure channel of [`ShuffleThunks`].
///
/// [`ShuffleThunks`]: crate::thunks::ShuffleThunks
#[derive(Debug, Error)]
pub enum ThunkError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}
