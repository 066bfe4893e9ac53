//! Byte buffers for assembling code, and executable memory to install it in.

use std::ops::{DerefMut};

mod vec;
pub use vec::{VecU8};

mod heap;
pub use heap::{CodeHeap};

pub trait Buffer: DerefMut<Target=[u8]> {
    /** Get the write pointer. */
    fn get_pos(&self) -> usize;

    /** Set the write pointer. */
    fn set_pos(&mut self, pos: usize);

    /** Writes a single byte at the write pointer, incrementing it. */
    fn write_byte(&mut self, byte: u8) {
        let pos = self.get_pos();
        self[pos] = byte;
        self.set_pos(pos + 1);
    }

    /**
     * Writes up to 8 bytes at the write pointer, as if using
     * `write_byte()` repeatedly.
     */
    fn write(&mut self, mut bytes: u64, len: usize) {
        assert!(len <= 8);
        for _ in 0..len {
            self.write_byte(bytes as u8);
            bytes >>= 8;
        }
        assert_eq!(bytes, 0);
    }
}

//-----------------------------------------------------------------------------
