use rustc_hash::{FxHashMap};

use super::{ShuffleArray, Location};

/**
 * A model of the argument registers and stack slots of a call, used to check
 * what a [`ShuffleArray`] does without compiling it. Each [`Location`] holds
 * one 64-bit slot; precision tags do not affect which slot is named.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    values: FxHashMap<Location, u64>,
}

/** A record read a [`Location`] that holds no value. */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Uninitialized(pub Location);

impl Frame {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, location: Location) -> Option<u64> {
        self.values.get(&location.slot()).copied()
    }

    pub fn set(&mut self, location: Location, value: u64) {
        self.values.insert(location.slot(), value);
    }

    /**
     * Executes the moves of `shuffle` left to right, as a compiled adapter
     * would. Reading an empty location, including the helper before it has
     * been written, is an error.
     */
    pub fn apply(&mut self, shuffle: &ShuffleArray) -> Result<(), Uninitialized> {
        for m in shuffle.moves() {
            let value = self.get(m.src).ok_or(Uninitialized(m.src))?;
            self.set(m.dest, value);
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------
