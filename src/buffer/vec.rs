use std::ops::{Deref, DerefMut};
use super::{Buffer};

/** A [`Buffer`] backed by a fixed-size `Vec<u8>`, for assembling code before it is installed. */
#[allow(clippy::module_name_repetitions)]
pub struct VecU8 {
    buffer: Vec<u8>,
    pos: usize,
}

impl VecU8 {
    pub fn new(buffer: Vec<u8>) -> Self {
        VecU8 {buffer, pos: 0}
    }

    /** Discards everything after the write pointer. */
    pub fn into_code(mut self) -> Vec<u8> {
        self.buffer.truncate(self.pos);
        self.buffer
    }
}

impl Deref for VecU8 {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &*self.buffer
    }
}

impl DerefMut for VecU8 {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl Buffer for VecU8 {
    fn get_pos(&self) -> usize { self.pos }
    fn set_pos(&mut self, pos: usize) { self.pos = pos; }
}
