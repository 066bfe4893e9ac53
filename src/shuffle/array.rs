use std::fmt::{self, Debug, Formatter};

use crate::error::{EncodeError, DecodeError};
use super::{ShuffleEntry, Location, ENTRY_SIZE, SENTINEL};

/** One decoded non-terminal record. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Move {
    pub src: Location,
    pub dest: Location,
}

/**
 * A sentinel-terminated sequence of [`ShuffleEntry`]s. A `ShuffleArray` is
 * always terminated: the only way to make one is to supply all of its moves
 * and the stack size delta at once, or to decode well-formed bytes.
 */
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShuffleArray {
    /// Includes the terminal record.
    entries: Box<[ShuffleEntry]>,
}

impl ShuffleArray {
    /** Encodes `moves`, in order, followed by the terminal record. */
    pub fn new(
        moves: impl IntoIterator<Item=Move>,
        stack_size_delta: i16,
    ) -> Result<Self, EncodeError> {
        let mut entries = Vec::new();
        for m in moves {
            entries.push(ShuffleEntry::new(m.src, m.dest)?);
        }
        entries.push(ShuffleEntry::sentinel(stack_size_delta));
        Ok(ShuffleArray {entries: entries.into()})
    }

    /** An array with no moves. Compiles to a pass-through adapter. */
    pub fn pass_through(stack_size_delta: i16) -> Self {
        ShuffleArray {entries: Box::new([ShuffleEntry::sentinel(stack_size_delta)])}
    }

    /** All records, including the terminal one. */
    pub fn entries(&self) -> &[ShuffleEntry] { &self.entries }

    /** The number of moves, not counting the terminal record. */
    pub fn len(&self) -> usize { self.entries.len() - 1 }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn stack_size_delta(&self) -> i16 {
        let last = self.entries[self.entries.len() - 1];
        last.stack_size_delta().unwrap_or_default()
    }

    /** The moves in execution order. */
    pub fn moves(&self) -> impl Iterator<Item=Move> + '_ {
        self.entries[..self.len()].iter().map(|e| Move {
            // Both fields were validated on construction.
            src: Location::decode(e.srcofs).unwrap_or(Location::Helper),
            dest: Location::decode(e.dstofs).unwrap_or(Location::Helper),
        })
    }

    /** The serialized form, which is also the Thunk Cache key. */
    pub fn to_bytes(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|e| e.to_bytes()).collect()
    }

    /**
     * The length in bytes of the array at the start of `raw`, including its
     * terminal record, or `None` if `raw` contains no terminal record.
     */
    pub fn byte_len(raw: &[u8]) -> Option<usize> {
        raw.chunks_exact(ENTRY_SIZE)
            .position(|c| u16::from_le_bytes([c[0], c[1]]) == SENTINEL)
            .map(|i| (i + 1) * ENTRY_SIZE)
    }

    /** Decodes the array at the start of `raw`. Trailing bytes are ignored. */
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let len = Self::byte_len(raw).ok_or(DecodeError::Unterminated)?;
        let mut entries = Vec::with_capacity(len / ENTRY_SIZE);
        for (record, chunk) in raw[..len].chunks_exact(ENTRY_SIZE).enumerate() {
            let entry = ShuffleEntry::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if !entry.is_sentinel() {
                if Location::decode(entry.srcofs).is_none() {
                    return Err(DecodeError::BadLocation {record, bits: entry.srcofs});
                }
                if entry.dstofs == SENTINEL {
                    return Err(DecodeError::SentinelDestination {record});
                }
                if Location::decode(entry.dstofs).is_none() {
                    return Err(DecodeError::BadLocation {record, bits: entry.dstofs});
                }
            }
            entries.push(entry);
        }
        Ok(ShuffleArray {entries: entries.into()})
    }
}

impl Debug for ShuffleArray {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

//-----------------------------------------------------------------------------
