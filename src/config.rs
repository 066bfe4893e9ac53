use crate::convention::{Convention};

/** Settings for a [`ShuffleThunks`](crate::thunks::ShuffleThunks) instance. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Config {
    /// Used to lay out both sides of every adapter.
    pub convention: Convention,
    /// The offset within the dispatch cell of the code pointer that compiled
    /// adapters jump to.
    pub dispatch_offset: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            convention: Convention::SYSV_X86_64,
            dispatch_offset: 8,
        }
    }
}
