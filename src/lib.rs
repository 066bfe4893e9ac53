//! Shuffle thunks: small machine-code adapters that rearrange the arguments
//! of a call laid out for one calling convention so that it can be forwarded
//! to code expecting another.
//!
//! The pipeline is:
//!  - [`convention`] lays out the arguments of a call.
//!  - [`builder`] turns a pair of layouts into a [`ShuffleArray`].
//!  - [`cache`] compiles each distinct array once and shares the stub.
//!  - [`target`] emits the machine code.
//!  - [`thunks`] and [`bind`] put it together for delegates and
//!    instantiating stubs.
//!
//! [`ShuffleArray`]: shuffle::ShuffleArray

pub mod util;

pub mod error;

pub mod config;

pub mod shuffle;

pub mod convention;

pub mod builder;

pub mod buffer;

pub mod cache;

pub mod target;

pub mod bind;

pub mod thunks;

pub use config::{Config};
pub use thunks::{ShuffleThunks, DelegateEntry};
