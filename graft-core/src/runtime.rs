//! The runtime: class registry and instance creation.
//!
//! A [`Runtime`] is a cheap-clone handle owning the process state of one
//! object world. There is deliberately no ambient global: tests and embedders
//! create as many independent runtimes as they need without
//! cross-contamination.

use crate::class::Class;
use crate::error::RuntimeError;
use crate::instance::{Obj, ObjRef};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

struct RuntimeInner {
    classes: RwLock<FxHashMap<String, Arc<Class>>>,
    next_obj_id: AtomicU64,
}

/// Handle to one object world. Clones share the same registry.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create an empty runtime.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                classes: RwLock::new(FxHashMap::default()),
                next_obj_id: AtomicU64::new(1),
            }),
        }
    }

    /// Define and register a new class.
    pub fn define_class(
        &self,
        name: &str,
        superclass: Option<&Arc<Class>>,
    ) -> Result<Arc<Class>, RuntimeError> {
        let mut classes = self.inner.classes.write();
        if classes.contains_key(name) {
            return Err(RuntimeError::ClassAlreadyDefined(name.to_string()));
        }
        let class = Class::new(name, superclass.cloned());
        classes.insert(name.to_string(), class.clone());
        Ok(class)
    }

    /// Fetch the class registered under `name`, creating and registering it
    /// with `build` if absent. Creation happens under the registry lock, so
    /// concurrent callers observe one class.
    ///
    /// Used for synthetic subclasses (interception shadows, observation
    /// classes) whose existence is an idempotent side effect.
    pub fn ensure_class_with(&self, name: &str, build: impl FnOnce() -> Arc<Class>) -> Arc<Class> {
        let mut classes = self.inner.classes.write();
        if let Some(class) = classes.get(name) {
            return class.clone();
        }
        let class = build();
        classes.insert(name.to_string(), class.clone());
        class
    }

    /// Look up a class by name.
    pub fn class(&self, name: &str) -> Option<Arc<Class>> {
        self.inner.classes.read().get(name).cloned()
    }

    /// Create an instance of `class`.
    pub fn instantiate(&self, class: &Arc<Class>) -> ObjRef {
        let id = self.inner.next_obj_id.fetch_add(1, Ordering::Relaxed);
        Obj::new(id, class.clone())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
