use super::OpKernel;
use crate::error::{FastGraphError, FastGraphResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct SessionKernels {
    holds: usize,
    kernels: HashMap<String, Arc<dyn OpKernel>>,
}

/// Kernel instances keyed by `(session, node name)`.
///
/// A session must be held (`add_hold`) before kernels can be cached for it.
/// When its last hold is removed, every kernel cached for the session is
/// dropped. Executors built over the same session share kernel instances, so
/// rebuilding an executor does not re-create kernels.
#[derive(Default)]
pub struct KernelCache {
    sessions: Mutex<HashMap<String, SessionKernels>>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached kernel for `node_name`, creating it with `create` on
    /// a miss.
    ///
    /// `create` runs without the cache lock held. If another caller caches a
    /// kernel for the same key meanwhile, that kernel wins and the freshly
    /// created one is dropped.
    pub fn find_or_create<F>(
        &self,
        session: &str,
        node_name: &str,
        create: F,
    ) -> FastGraphResult<Arc<dyn OpKernel>>
    where
        F: FnOnce() -> FastGraphResult<Arc<dyn OpKernel>>,
    {
        {
            let sessions = self.sessions.lock();
            let entry = sessions.get(session).ok_or_else(|| {
                FastGraphError::not_found(format!("Session {} is not found", session))
            })?;
            if let Some(kernel) = entry.kernels.get(node_name) {
                return Ok(kernel.clone());
            }
        }

        let kernel = create()?;

        let mut sessions = self.sessions.lock();
        let entry = sessions.get_mut(session).ok_or_else(|| {
            FastGraphError::not_found(format!("Session {} is not found", session))
        })?;
        Ok(entry
            .kernels
            .entry(node_name.to_string())
            .or_insert(kernel)
            .clone())
    }

    /// Keep `session`'s kernels alive until a matching `remove_hold`
    pub fn add_hold(&self, session: &str) {
        let mut sessions = self.sessions.lock();
        sessions.entry(session.to_string()).or_default().holds += 1;
    }

    pub fn remove_hold(&self, session: &str) {
        let mut sessions = self.sessions.lock();
        let drop_session = match sessions.get_mut(session) {
            Some(entry) => {
                entry.holds = entry.holds.saturating_sub(1);
                entry.holds == 0
            }
            None => false,
        };
        if drop_session {
            if let Some(entry) = sessions.remove(session) {
                log::debug!(
                    "Releasing {} cached kernels of session '{}'",
                    entry.kernels.len(),
                    session
                );
            }
        }
    }

    pub fn is_held(&self, session: &str) -> bool {
        self.sessions.lock().contains_key(session)
    }

    /// Number of kernels cached for `session`
    pub fn num_kernels(&self, session: &str) -> usize {
        self.sessions
            .lock()
            .get(session)
            .map(|s| s.kernels.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{KernelFactory, KernelRegistry};
    use crate::graph::NodeDef;
    use crate::tensor::DataType;

    fn identity(name: &str) -> NodeDef {
        NodeDef::new(name, "Identity").with_attr("T", DataType::Float)
    }

    #[test]
    fn test_requires_hold() {
        let cache = KernelCache::new();
        let registry = KernelRegistry::with_builtin_kernels();
        let def = identity("a");
        let err = cache
            .find_or_create("s", "a", || registry.create_kernel(&def))
            .err()
            .unwrap();
        assert!(matches!(err, FastGraphError::NotFound(_)));
    }

    #[test]
    fn test_create_once_per_key() {
        let cache = KernelCache::new();
        let registry = KernelRegistry::with_builtin_kernels();
        cache.add_hold("s");

        let def = identity("a");
        let mut created = 0;
        let first = cache
            .find_or_create("s", "a", || {
                created += 1;
                registry.create_kernel(&def)
            })
            .unwrap();
        let second = cache
            .find_or_create("s", "a", || {
                created += 1;
                registry.create_kernel(&def)
            })
            .unwrap();

        assert_eq!(created, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.num_kernels("s"), 1);
    }

    #[test]
    fn test_last_hold_releases_kernels() {
        let cache = KernelCache::new();
        let registry = KernelRegistry::with_builtin_kernels();
        cache.add_hold("s");
        cache.add_hold("s");

        let def = identity("a");
        let kernel = cache
            .find_or_create("s", "a", || registry.create_kernel(&def))
            .unwrap();
        assert_eq!(Arc::strong_count(&kernel), 2);

        cache.remove_hold("s");
        assert!(cache.is_held("s"));
        cache.remove_hold("s");
        assert!(!cache.is_held("s"));
        assert_eq!(Arc::strong_count(&kernel), 1);
    }

    #[test]
    fn test_creation_failure_not_cached() {
        let cache = KernelCache::new();
        cache.add_hold("s");
        let result = cache.find_or_create("s", "a", || {
            Err(FastGraphError::KernelCreation {
                node: "a".into(),
                message: "no".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(cache.num_kernels("s"), 0);
    }
}
