//! The System V x86_64 adapter convention.

mod assembler;
pub use assembler::{Assembler, Register, Xmm, Precision, RegisterField};
use Register::*;

mod emitter;
pub use emitter::{ShuffleEmitter};

/**
 * In the System V amd64 calling convention, these registers hold the integer-
 * or pointer-type function arguments.
 */
pub const ARGUMENTS: [Register; 6] = [RDI, RSI, RD, RC, R8, R9];

/**
 * In the System V amd64 calling convention, these registers hold the
 * floating-point function arguments.
 */
pub const FLOAT_ARGUMENTS: [Xmm; 8] =
    [Xmm(0), Xmm(1), Xmm(2), Xmm(3), Xmm(4), Xmm(5), Xmm(6), Xmm(7)];

/** Holds the dispatch cell on entry to an adapter. Not an argument register. */
pub const DISPATCH: Register = R10;

/** Implements `Location::Helper`. */
pub const HELPER: Register = R11;

/** Scratch register for stack-to-stack moves. */
pub const SCRATCH: Register = RA;

/** The offset from `RSP` of the first stack argument, on entry. */
pub const STACK_ARGUMENTS: i32 = 8;
