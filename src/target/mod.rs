//! Per-architecture code emitters for adapter stubs.
//!
//! Only the assembler and emitter depend on the host architecture; the rest
//! of the crate is portable. Emitters can be constructed on any host, but the
//! code they produce only runs on the matching one.

pub mod x86_64;
