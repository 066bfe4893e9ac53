//! The Thunk Cache: a process-wide table from shuffle-array content to
//! compiled adapter stubs. Callers that present byte-identical arrays share
//! one stub.

use std::fmt::{self, Debug, Formatter};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use rustc_hash::{FxHashMap};
use tracing::{debug, error};

use crate::error::{CompileError, DecodeError, EmitError};
use crate::shuffle::{ShuffleArray};
use crate::util::{ArcEq};

/** The address of the first instruction of a compiled stub. */
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct EntryPoint(pub usize);

impl EntryPoint {
    pub fn as_ptr(self) -> *const u8 { self.0 as *const u8 }
}

impl Debug for EntryPoint {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        write!(f, "EntryPoint({:#x})", self.0)
    }
}

/** What a compiled stub does before it forwards the call. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StubKind {
    /// The array has no moves; the stub only forwards.
    PassThrough,
    ShuffleThunk,
}

impl StubKind {
    pub fn of(shuffle: &ShuffleArray) -> Self {
        if shuffle.is_empty() { StubKind::PassThrough } else { StubKind::ShuffleThunk }
    }
}

/** A compiled adapter. Never freed while its cache lives. */
#[derive(Debug)]
pub struct Stub {
    pub entry_point: EntryPoint,
    pub kind: StubKind,
    /// The serialized array the stub was compiled from, including the
    /// terminal record.
    pub shuffle: Box<[u8]>,
}

/** A shared reference to a [`Stub`]. Handles are equal iff they refer to the same stub. */
pub type StubHandle = ArcEq<Stub>;

/**
 * The code-emission service: produces executable machine code implementing
 * a [`ShuffleArray`] under the platform's adapter calling convention.
 */
pub trait EmitAdapter: Send + Sync {
    fn emit_adapter(&self, shuffle: &ShuffleArray) -> Result<EntryPoint, EmitError>;
}

//-----------------------------------------------------------------------------

/**
 * Deduplicates compiled adapters by the byte content of their shuffle arrays.
 *
 * Lookups take a shared lock. A miss takes the upgradable lock, which
 * excludes other compilers but not readers, so concurrent requests for the
 * same content cause exactly one call to [`EmitAdapter::emit_adapter()`].
 * Entries are never removed.
 */
pub struct ThunkCache<E> {
    emitter: E,
    stubs: RwLock<FxHashMap<Box<[u8]>, StubHandle>>,
}

impl<E: EmitAdapter> ThunkCache<E> {
    pub fn new(emitter: E) -> Self {
        ThunkCache {emitter, stubs: RwLock::new(FxHashMap::default())}
    }

    pub fn emitter(&self) -> &E { &self.emitter }

    /** Looks up the stub compiled from the array at the start of `raw`. */
    pub fn get(&self, raw: &[u8]) -> Option<StubHandle> {
        let len = ShuffleArray::byte_len(raw)?;
        self.stubs.read().get(&raw[..len]).cloned()
    }

    /** The number of distinct stubs compiled so far. */
    pub fn len(&self) -> usize { self.stubs.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /** Compiles `shuffle`, or returns the stub compiled from an equal array. */
    pub fn compile(&self, shuffle: &ShuffleArray) -> Result<StubHandle, CompileError> {
        self.compile_or_reuse(&shuffle.to_bytes())
    }

    /**
     * Returns the stub for the shuffle array at the start of `raw`, compiling
     * it if no byte-identical array has been seen before. The key is the
     * bytes up to and including the terminal record; trailing bytes are
     * ignored.
     *
     * On failure nothing is inserted, and existing entries are unaffected.
     */
    pub fn compile_or_reuse(&self, raw: &[u8]) -> Result<StubHandle, CompileError> {
        let len = match ShuffleArray::byte_len(raw) {
            Some(len) => len,
            None => {
                error!(bytes = raw.len(), "shuffle array has no terminal record");
                return Err(DecodeError::Unterminated.into());
            },
        };
        let key = &raw[..len];
        if let Some(stub) = self.stubs.read().get(key) {
            debug!(entry_point = ?stub.entry_point, "reusing stub");
            return Ok(stub.clone());
        }
        let stubs = self.stubs.upgradable_read();
        // Another thread may have compiled it while we waited.
        if let Some(stub) = stubs.get(key) {
            debug!(entry_point = ?stub.entry_point, "reusing stub");
            return Ok(stub.clone());
        }
        let shuffle = ShuffleArray::from_bytes(key).map_err(|e| {
            error!(%e, "malformed shuffle array");
            CompileError::from(e)
        })?;
        let entry_point = self.emitter.emit_adapter(&shuffle).map_err(|e| {
            error!(%e, ?shuffle, "adapter emission failed");
            CompileError::from(e)
        })?;
        let stub = ArcEq::new(Stub {entry_point, kind: StubKind::of(&shuffle), shuffle: key.into()});
        debug!(?entry_point, kind = ?stub.kind, ?shuffle, "compiled stub");
        let mut stubs = RwLockUpgradableReadGuard::upgrade(stubs);
        stubs.insert(key.into(), stub.clone());
        Ok(stub)
    }
}

impl<E> Debug for ThunkCache<E> {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("ThunkCache").field("len", &self.stubs.read().len()).finish()
    }
}

//-----------------------------------------------------------------------------
