use memmap::{Mmap, MmapMut};
use parking_lot::{Mutex};

use crate::cache::{EntryPoint};

/**
 * Executable memory for compiled stubs. Each installed stub gets its own
 * read-only executable mapping, which stays mapped until the `CodeHeap` is
 * dropped.
 */
#[derive(Default)]
pub struct CodeHeap {
    regions: Mutex<Vec<Mmap>>,
}

impl CodeHeap {
    pub fn new() -> Self { Self::default() }

    /**
     * Copies `code` into a fresh mapping, makes it executable, and returns
     * the address of its first byte.
     */
    pub fn install(&self, code: &[u8]) -> std::io::Result<EntryPoint> {
        let mut memory = MmapMut::map_anon(code.len().max(1))?;
        memory[..code.len()].copy_from_slice(code);
        let memory = memory.make_exec()?;
        let entry_point = EntryPoint(memory.as_ptr() as usize);
        self.regions.lock().push(memory);
        Ok(entry_point)
    }

    /** The number of installed stubs. */
    pub fn len(&self) -> usize { self.regions.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl std::fmt::Debug for CodeHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        f.debug_struct("CodeHeap").field("regions", &self.len()).finish()
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install() {
        let heap = CodeHeap::new();
        assert!(heap.is_empty());
        let a = heap.install(&[0xC3]).expect("Couldn't allocate");
        let b = heap.install(&[0x90, 0xC3]).expect("Couldn't allocate");
        assert_ne!(a, b);
        assert_eq!(heap.len(), 2);
        let bytes = unsafe { std::slice::from_raw_parts(b.as_ptr(), 2) };
        assert_eq!(bytes, [0x90, 0xC3]);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn execute() {
        let heap = CodeHeap::new();
        // mov eax, 42; ret
        let entry = heap.install(&[0xB8, 0x2A, 0x00, 0x00, 0x00, 0xC3]).expect("Couldn't allocate");
        let f: extern "C" fn() -> i32 = unsafe { std::mem::transmute(entry.as_ptr()) };
        assert_eq!(f(), 42);
    }
}
