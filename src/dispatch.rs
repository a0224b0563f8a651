//! Type-keyed handler dispatch with table chaining and instance overrides
//!
//! A [`DispatchTable`] routes an object to a handler chosen by the object's
//! most specific registered type. Tables can chain to a parent table so a
//! wrapping converter inherits a base registry and selectively overrides
//! behavior, and a single owning instance can shadow class-keyed handlers
//! with its own without touching the shared table.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use crate::error::DispatchError;

/// Identifies one owning instance of a dispatch table (a converter or
/// labeler object). Instance-keyed registrations are scoped to an owner and
/// vanish when the owning table is dropped.
pub type OwnerId = u64;

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique owner id.
pub fn next_owner_id() -> OwnerId {
    NEXT_OWNER.fetch_add(1, Ordering::Relaxed)
}

/// A type identifier usable as a dispatch key.
///
/// `mro()` is the most-derived-first linearization of the type's ancestor
/// chain, starting with the type itself; resolution walks it in order.
pub trait TypeKey: Copy + Eq + Hash + 'static {
    /// Ancestor chain, most derived first, including the type itself.
    fn mro(self) -> &'static [Self];

    /// Fully qualified name, used in error messages.
    fn type_name(self) -> &'static str;
}

/// Registry mapping type keys to handlers, with an optional parent table.
///
/// Two registries live in each table: a class-keyed table shared by every
/// owner, and an instance-keyed table scoped to a single [`OwnerId`]. The
/// parent chain is acyclic by construction: a table can only parent on an
/// already-built table frozen behind an `Arc`.
#[derive(Debug)]
pub struct DispatchTable<K: TypeKey, H: Clone> {
    class_table: HashMap<K, H>,
    instance_table: HashMap<(OwnerId, K), H>,
    parent: Option<Arc<DispatchTable<K, H>>>,
}

impl<K: TypeKey, H: Clone> DispatchTable<K, H> {
    /// Creates an empty table with no parent.
    pub fn new() -> Self {
        Self {
            class_table: HashMap::new(),
            instance_table: HashMap::new(),
            parent: None,
        }
    }

    /// Creates an empty table that falls back to `parent` during resolution.
    pub fn with_parent(parent: Arc<DispatchTable<K, H>>) -> Self {
        Self {
            class_table: HashMap::new(),
            instance_table: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Registers a class-keyed handler.
    ///
    /// Fails with [`DispatchError::DuplicateRegistration`] if `key` is
    /// already class-registered in this table. Registering a key that a
    /// parent table also knows is allowed; the child's entry shadows it.
    pub fn register(&mut self, key: K, handler: H) -> Result<(), DispatchError> {
        if self.class_table.contains_key(&key) {
            return Err(DispatchError::DuplicateRegistration {
                type_name: key.type_name(),
            });
        }
        self.class_table.insert(key, handler);
        Ok(())
    }

    /// Registers an instance-keyed handler for `owner`.
    ///
    /// Always succeeds, last write wins. The entry takes precedence over
    /// class-keyed handlers for that owner.
    pub fn register_instance(&mut self, owner: OwnerId, key: K, handler: H) {
        debug!(
            "instance handler registered for {} (owner {})",
            key.type_name(),
            owner
        );
        self.instance_table.insert((owner, key), handler);
    }

    /// Resolves a handler for an object whose runtime type is `runtime`.
    ///
    /// For each type in `runtime`'s linearization: the owner's instance
    /// entry wins, then this table's class entry, then a full resolution on
    /// the parent table. A parent that has no handler is not an error; the
    /// walk continues with the next ancestor. Only when the whole chain is
    /// exhausted does resolution fail with [`DispatchError::NoHandler`].
    pub fn resolve(&self, owner: OwnerId, runtime: K) -> Result<H, DispatchError> {
        for &cls in runtime.mro() {
            if let Some(handler) = self.instance_table.get(&(owner, cls)) {
                return Ok(handler.clone());
            }
            if let Some(handler) = self.class_table.get(&cls) {
                return Ok(handler.clone());
            }
            if let Some(parent) = &self.parent {
                match parent.resolve(owner, runtime) {
                    Ok(handler) => return Ok(handler),
                    Err(DispatchError::NoHandler { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Err(DispatchError::NoHandler {
            type_name: runtime.type_name(),
        })
    }

    /// Whether `key` is class-registered in this table (parents excluded).
    pub fn is_registered(&self, key: K) -> bool {
        self.class_table.contains_key(&key)
    }
}

impl<K: TypeKey, H: Clone> Default for DispatchTable<K, H> {
    fn default() -> Self {
        Self::new()
    }
}
