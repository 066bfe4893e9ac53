//! The shuffle array: a compact, content-addressable plan of argument
//! relocations, terminated by a sentinel record carrying the stack size delta.
//!
//! The binary format is a stable contract between the plan builder, the
//! Thunk Cache (which uses it as a key) and the code emitters.

mod entry;
pub use entry::{
    ShuffleEntry, Location, ENTRY_SIZE,
    REGMASK, FPREGMASK, FPSINGLEMASK, OFSMASK, OFSREGMASK, SENTINEL, HELPERREG,
};

mod array;
pub use array::{ShuffleArray, Move};

mod interpret;
pub use interpret::{Frame, Uninitialized};
