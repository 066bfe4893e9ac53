//! The calling-convention adapter surface: turns pairs of method signatures
//! and delegate binding requests into compiled stubs.

use tracing::{debug};

use crate::bind::{select, BindingFlags, BindTarget, Method};
use crate::builder::{build_shuffle_array, Adaptation};
use crate::cache::{EmitAdapter, StubHandle, ThunkCache};
use crate::config::{Config};
use crate::convention::{Layout};
use crate::error::{BuildError, ThunkError};

/** How a bound delegate reaches its target. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateEntry {
    /// The target is called directly, with the bound target in place of the delegate.
    Direct {method: Method},
    /// The delegate's invoke call goes through `stub`, which rearranges the
    /// arguments and tail-calls `method`.
    Shuffle {method: Method, stub: StubHandle},
}

impl DelegateEntry {
    pub fn method(&self) -> &Method {
        match self {
            DelegateEntry::Direct {method} | DelegateEntry::Shuffle {method, ..} => method,
        }
    }

    pub fn stub(&self) -> Option<&StubHandle> {
        match self {
            DelegateEntry::Direct {..} => None,
            DelegateEntry::Shuffle {stub, ..} => Some(stub),
        }
    }
}

/** Compiles and shares adapters between calling conventions. */
#[derive(Debug)]
pub struct ShuffleThunks<E> {
    config: Config,
    cache: ThunkCache<E>,
}

impl<E: EmitAdapter> ShuffleThunks<E> {
    pub fn new(config: Config, emitter: E) -> Self {
        ShuffleThunks {config, cache: ThunkCache::new(emitter)}
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn cache(&self) -> &ThunkCache<E> { &self.cache }

    /**
     * Returns a stub that accepts a call to `source` and forwards it as a
     * call to `target`, related by `mode`.
     */
    pub fn adapter(&self, source: &Method, target: &Method, mode: Adaptation) -> Result<StubHandle, ThunkError> {
        let convention = &self.config.convention;
        let from = Layout::compute(&source.signature(convention), convention).map_err(BuildError::from)?;
        let to = Layout::compute(&target.signature(convention), convention).map_err(BuildError::from)?;
        let shuffle = build_shuffle_array(&from, &to, mode)?;
        debug!(source = %source.name, target = %target.name, ?mode, moves = shuffle.len(), "built shuffle");
        Ok(self.cache.compile(&shuffle)?)
    }

    /**
     * Binds a delegate whose invoke method is `invoke` to the first of
     * `candidates` named `name` that the policy `flags` allows over `target`.
     */
    pub fn bind(
        &self,
        invoke: &Method,
        candidates: &[Method],
        name: &str,
        flags: BindingFlags,
        target: &BindTarget,
    ) -> Result<DelegateEntry, ThunkError> {
        let binding = select(invoke, candidates, name, flags, target)?;
        debug!(name, shape = ?binding.shape, declaring_type = %binding.method.declaring_type, "bound delegate");
        let method = binding.method.clone();
        Ok(match binding.shape.adaptation() {
            None => DelegateEntry::Direct {method},
            Some(mode) => {
                let stub = self.adapter(invoke, &method, mode)?;
                DelegateEntry::Shuffle {method, stub}
            },
        })
    }
}

#[cfg(target_arch = "x86_64")]
impl ShuffleThunks<crate::target::x86_64::ShuffleEmitter> {
    /** Compiles adapters for the host. */
    pub fn native(config: Config) -> Self {
        let emitter = crate::target::x86_64::ShuffleEmitter::new(config.dispatch_offset);
        Self::new(config, emitter)
    }

    /**
     * Installs an entry point that calls `stub` with `cell` as its dispatch
     * cell. Its code lives as long as `self`.
     */
    pub fn entry(&self, stub: &StubHandle, cell: usize) -> Result<crate::cache::EntryPoint, ThunkError> {
        let emitter = self.cache.emitter();
        let entry_point = emitter.emit_entry(cell, stub.entry_point).map_err(crate::error::CompileError::from)?;
        Ok(entry_point)
    }
}

//-----------------------------------------------------------------------------
