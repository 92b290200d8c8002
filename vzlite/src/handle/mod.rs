//! Process-wide registry of values addressed by opaque tokens.
//!
//! The native runtime never sees a Rust pointer. Before a foreign call that may
//! call back, the bridge registers the consumer-side value here and passes the
//! returned [`Handle`] instead. Callback entry points resolve the token back to
//! the value; an unknown or released token resolves to a typed
//! [`HandleError`] rather than to stale memory.
//!
//! ## Ownership
//!
//! Release is caller-directed:
//! - one-shot values (completion slots) release themselves after first use
//! - persistent values (machine state, disconnect inbox, window binding) are
//!   released by the machine's teardown routine, which runs at most once
//!
//! Resolve hands out an `Arc` clone taken under the table lock, so a release
//! racing an outstanding resolve only drops the table's reference; the caller
//! keeps a live value until it is done with it.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use vzlite_shared::{Handle, HandleError};

static GLOBAL: LazyLock<HandleRegistry> = LazyLock::new(HandleRegistry::new);

/// Type-erased registry entry, tagged with the registered type's name.
struct Slot {
    tag: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// Table mapping integer tokens to registered values.
pub struct HandleRegistry {
    next: AtomicUsize,
    slots: RwLock<HashMap<usize, Slot>>,
}

impl HandleRegistry {
    /// Create an empty registry. Most callers want [`HandleRegistry::global`].
    pub fn new() -> Self {
        Self {
            // Zero is Handle::INVALID.
            next: AtomicUsize::new(1),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// The registry the callback entry points resolve against.
    pub fn global() -> &'static HandleRegistry {
        &GLOBAL
    }

    /// Register a value and return its token.
    pub fn register<T: Any + Send + Sync>(&self, value: T) -> Handle {
        self.register_arc(Arc::new(value))
    }

    /// Register an already shared value.
    pub fn register_arc<T: Any + Send + Sync>(&self, value: Arc<T>) -> Handle {
        self.register_with(|_| value)
    }

    /// Register a value that needs to know its own token.
    ///
    /// The constructor runs before the slot is visible, so no resolve can
    /// observe a half-built value.
    pub fn register_with<T, F>(&self, build: F) -> Handle
    where
        T: Any + Send + Sync,
        F: FnOnce(Handle) -> Arc<T>,
    {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        let handle = Handle::from_raw(raw);
        let value = build(handle);

        self.slots.write().insert(
            raw,
            Slot {
                tag: type_name::<T>(),
                value,
            },
        );

        tracing::trace!(token = %handle, kind = type_name::<T>(), "Registered handle");
        handle
    }

    /// Resolve a token to the value registered under it.
    ///
    /// # Errors
    ///
    /// - [`HandleError::NotFound`] if the token was never issued or was released
    /// - [`HandleError::TypeMismatch`] if the token names a value of another type
    pub fn resolve<T: Any + Send + Sync>(&self, handle: Handle) -> Result<Arc<T>, HandleError> {
        let slots = self.slots.read();
        let slot = slots
            .get(&handle.as_raw())
            .ok_or(HandleError::NotFound(handle))?;

        Arc::clone(&slot.value)
            .downcast::<T>()
            .map_err(|_| HandleError::TypeMismatch {
                handle,
                expected: type_name::<T>(),
                found: slot.tag,
            })
    }

    /// Release a token. Later resolves of it fail with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the token is not live, which means two owners
    /// tried to release the same token.
    pub fn release(&self, handle: Handle) -> Result<(), HandleError> {
        match self.slots.write().remove(&handle.as_raw()) {
            Some(slot) => {
                tracing::trace!(token = %handle, kind = slot.tag, "Released handle");
                Ok(())
            }
            None => Err(HandleError::NotFound(handle)),
        }
    }

    /// Whether the token currently names a value.
    pub fn contains(&self, handle: Handle) -> bool {
        self.slots.read().contains_key(&handle.as_raw())
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("live", &self.len())
            .finish()
    }
}
