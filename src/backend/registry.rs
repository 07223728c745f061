//! Emitter registry.
//!
//! A process-wide name → factory table. [`register_all`] fills it once at startup; after that every
//! access is a read. Registering a name twice is a programming error and panics.

use std::collections::BTreeMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use super::artifact::Artifact;
use super::context::EmitContext;
use super::emit;
use super::errors::EmitError;

/// The body of an emitter: a pure function from frozen inputs to artifacts.
pub type EmitFn = fn(&EmitContext<'_>) -> Result<Vec<Artifact>, EmitError>;

/// A named emitter. Stateless, so copies are interchangeable.
#[derive(Clone, Copy)]
pub struct Emitter {
    pub name: &'static str,
    emit: EmitFn,
}

impl Emitter {
    pub const fn new(name: &'static str, emit: EmitFn) -> Self {
        Self { name, emit }
    }

    pub fn emit(&self, ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
        tracing::debug!(emitter = self.name, "running emitter");
        (self.emit)(ctx)
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter").field("name", &self.name).finish()
    }
}

impl PartialEq for Emitter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && std::ptr::fn_addr_eq(self.emit, other.emit)
    }
}

pub type EmitterFactory = fn() -> Emitter;

/// Name → factory table, safe for concurrent readers.
#[derive(Default)]
pub struct EmitterRegistry {
    inner: RwLock<BTreeMap<&'static str, EmitterFactory>>,
}

impl EmitterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, panicking if the name is taken.
    pub fn register(&self, name: &'static str, factory: EmitterFactory) {
        if !self.try_register(name, factory) {
            panic!("emitter {name:?} registered twice");
        }
    }

    /// Register a factory; `false` when the name is already present.
    pub fn try_register(&self, name: &'static str, factory: EmitterFactory) -> bool {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(name) {
            return false;
        }
        map.insert(name, factory);
        true
    }

    pub fn get(&self, name: &str) -> Option<Emitter> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Register every built-in emitter into `registry`.
pub fn register_all(registry: &EmitterRegistry) {
    for factory in emit::FACTORIES {
        let emitter = factory();
        registry.register(emitter.name, *factory);
    }
}

static GLOBAL: OnceLock<EmitterRegistry> = OnceLock::new();

/// The process-wide registry, populated on first access.
pub fn global() -> &'static EmitterRegistry {
    GLOBAL.get_or_init(|| {
        let registry = EmitterRegistry::new();
        register_all(&registry);
        tracing::debug!(emitters = registry.len(), "emitter registry initialised");
        registry
    })
}
