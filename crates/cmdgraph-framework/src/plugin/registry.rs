//! Plugin registries.
//!
//! A [`PluginRegistry`] answers two questions: which plugin uids exist right
//! now, and how to load one of them. The integrity validator uses the first,
//! the router and auto-dispatch use the second.
//!
//! | Registry | Source of plugins |
//! |----------|-------------------|
//! | [`BuiltinRegistry`] | descriptors linked in via [`register_plugin!`](crate::register_plugin) |
//! | [`StaticRegistry`] | an explicit list, for tests and embedding |
//! | [`DirectoryRegistry`](super::DirectoryRegistry) | JSON manifests, re-scanned per call |
//! | [`LayeredRegistry`] | an ordered union of the above |

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tokio::task;
use tracing::{error, warn};

use super::{PLUGIN_REGISTRY, PluginDescriptor, PluginHandle};

// ─── PluginRegistry trait ────────────────────────────────────────────────────

/// Maps plugin uids to loadable handles.
pub trait PluginRegistry: Send + Sync {
    /// Every uid currently available.
    fn list(&self) -> BTreeSet<String>;

    /// Loads the plugin registered under `uid`.
    fn load(&self, uid: &str) -> Option<PluginHandle>;

    fn contains(&self, uid: &str) -> bool {
        self.list().contains(uid)
    }

    /// Loads every available plugin, in uid order.
    fn handles(&self) -> Vec<PluginHandle> {
        self.list().iter().filter_map(|uid| self.load(uid)).collect()
    }
}

impl<R: PluginRegistry + ?Sized> PluginRegistry for Arc<R> {
    fn list(&self) -> BTreeSet<String> {
        (**self).list()
    }

    fn load(&self, uid: &str) -> Option<PluginHandle> {
        (**self).load(uid)
    }

    fn contains(&self, uid: &str) -> bool {
        (**self).contains(uid)
    }
}

// ─── BuiltinRegistry ─────────────────────────────────────────────────────────

/// The compiled-in plugin table.
///
/// When two descriptors share a uid the first one linked wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRegistry;

impl BuiltinRegistry {
    /// Creates the registry, warning about uids registered more than once.
    pub fn new() -> Self {
        let mut seen = HashSet::new();
        for descriptor in PLUGIN_REGISTRY.iter() {
            if !seen.insert(descriptor.uid) {
                warn!(
                    plugin = descriptor.uid,
                    "Duplicate built-in plugin uid, first registration wins"
                );
            }
        }
        Self
    }

    pub fn descriptors(&self) -> &'static [PluginDescriptor] {
        &PLUGIN_REGISTRY
    }
}

impl PluginRegistry for BuiltinRegistry {
    fn list(&self) -> BTreeSet<String> {
        PLUGIN_REGISTRY.iter().map(|d| d.uid.to_string()).collect()
    }

    fn load(&self, uid: &str) -> Option<PluginHandle> {
        PLUGIN_REGISTRY
            .iter()
            .find(|d| d.uid == uid)
            .map(PluginDescriptor::handle)
    }

    fn contains(&self, uid: &str) -> bool {
        PLUGIN_REGISTRY.iter().any(|d| d.uid == uid)
    }
}

// ─── StaticRegistry ──────────────────────────────────────────────────────────

/// A fixed set of plugins supplied at construction.
///
/// Registering a uid twice replaces the earlier handle.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    handles: BTreeMap<String, PluginHandle>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, descriptor: PluginDescriptor) -> Self {
        self.insert(descriptor.handle());
        self
    }

    pub fn with_handle(mut self, handle: PluginHandle) -> Self {
        self.insert(handle);
        self
    }

    pub fn insert(&mut self, handle: PluginHandle) {
        self.handles.insert(handle.uid().to_string(), handle);
    }

    pub fn remove(&mut self, uid: &str) -> Option<PluginHandle> {
        self.handles.remove(uid)
    }
}

impl PluginRegistry for StaticRegistry {
    fn list(&self) -> BTreeSet<String> {
        self.handles.keys().cloned().collect()
    }

    fn load(&self, uid: &str) -> Option<PluginHandle> {
        self.handles.get(uid).cloned()
    }

    fn contains(&self, uid: &str) -> bool {
        self.handles.contains_key(uid)
    }
}

// ─── LayeredRegistry ─────────────────────────────────────────────────────────

/// An ordered union of registries.
///
/// `list` merges every layer; `load` returns the handle from the first layer
/// that knows the uid.
#[derive(Clone, Default)]
pub struct LayeredRegistry {
    layers: Vec<Arc<dyn PluginRegistry>>,
}

impl LayeredRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(mut self, registry: impl PluginRegistry + 'static) -> Self {
        self.layers.push(Arc::new(registry));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl PluginRegistry for LayeredRegistry {
    fn list(&self) -> BTreeSet<String> {
        self.layers.iter().flat_map(|l| l.list()).collect()
    }

    fn load(&self, uid: &str) -> Option<PluginHandle> {
        self.layers.iter().find_map(|l| l.load(uid))
    }

    fn contains(&self, uid: &str) -> bool {
        self.layers.iter().any(|l| l.contains(uid))
    }
}

// ─── Queries from async code ─────────────────────────────────────────────────

/// Loads `uid` on the blocking pool.
///
/// Registries may read the filesystem on every call; async callers go
/// through here so a worker thread never waits on disk.
pub async fn load_plugin(registry: &Arc<dyn PluginRegistry>, uid: &str) -> Option<PluginHandle> {
    let registry = Arc::clone(registry);
    let key = uid.to_string();
    match task::spawn_blocking(move || registry.load(&key)).await {
        Ok(handle) => handle,
        Err(e) => {
            error!(plugin = %uid, error = %e, "Plugin lookup task failed");
            None
        }
    }
}

/// Lists plugin uids on the blocking pool. See [`load_plugin`].
pub async fn list_plugins(registry: &Arc<dyn PluginRegistry>) -> BTreeSet<String> {
    let registry = Arc::clone(registry);
    match task::spawn_blocking(move || registry.list()).await {
        Ok(uids) => uids,
        Err(e) => {
            error!(error = %e, "Plugin listing task failed");
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginResult;
    use crate::plugin::{FromArgs, Plugin, PluginArgs};
    use crate::register_plugin;
    use async_trait::async_trait;
    use cmdgraph_core::Reply;

    struct Fixed(&'static str);

    #[async_trait]
    impl Plugin for Fixed {
        async fn run(&self) -> PluginResult<Option<Reply>> {
            Ok(Some(Reply::message([self.0])))
        }
    }

    struct Alpha;

    impl FromArgs for Fixed {
        fn from_args(_: PluginArgs) -> PluginResult<Self> {
            Ok(Fixed("fixed"))
        }
    }

    impl FromArgs for Alpha {
        fn from_args(_: PluginArgs) -> PluginResult<Self> {
            Ok(Alpha)
        }
    }

    #[async_trait]
    impl Plugin for Alpha {
        async fn run(&self) -> PluginResult<Option<Reply>> {
            Ok(Some(Reply::message(["alpha"])))
        }
    }

    register_plugin! {
        static REGISTRY_TEST_PLUGIN = PluginDescriptor::of::<Alpha>("registry_test_alpha");
    }

    #[tokio::test]
    async fn test_builtin_registry_sees_linked_plugins() {
        let registry = BuiltinRegistry::new();
        assert!(registry.list().contains("registry_test_alpha"));
        assert!(registry.contains("registry_test_alpha"));
        assert!(registry.load("registry_test_missing").is_none());

        let reply = registry
            .load("registry_test_alpha")
            .unwrap()
            .invoke(PluginArgs::default())
            .await
            .unwrap();
        assert_eq!(reply, Some(Reply::message(["alpha"])));
        assert_eq!(REGISTRY_TEST_PLUGIN.uid, "registry_test_alpha");
    }

    #[test]
    fn test_static_registry() {
        let mut registry = StaticRegistry::new()
            .with(PluginDescriptor::of::<Fixed>("fixed"))
            .with(PluginDescriptor::of::<Alpha>("alpha"));
        assert_eq!(
            registry.list().into_iter().collect::<Vec<_>>(),
            vec!["alpha".to_string(), "fixed".to_string()]
        );
        assert!(registry.remove("alpha").is_some());
        assert!(!registry.contains("alpha"));
        assert_eq!(registry.handles().len(), 1);
    }

    #[tokio::test]
    async fn test_layered_registry_first_layer_wins() {
        let first = StaticRegistry::new().with(PluginDescriptor::of::<Alpha>("shared"));
        let second = StaticRegistry::new()
            .with(PluginDescriptor::of::<Fixed>("shared"))
            .with(PluginDescriptor::of::<Fixed>("only_second"));
        let registry = LayeredRegistry::new().layer(first).layer(second);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list().len(), 2);
        assert!(registry.contains("only_second"));

        let reply = registry
            .load("shared")
            .unwrap()
            .invoke(PluginArgs::default())
            .await
            .unwrap();
        assert_eq!(reply, Some(Reply::message(["alpha"])));
    }

    #[tokio::test]
    async fn test_async_queries() {
        let registry: Arc<dyn PluginRegistry> =
            Arc::new(StaticRegistry::new().with(PluginDescriptor::of::<Alpha>("alpha")));
        assert_eq!(
            list_plugins(&registry).await.into_iter().collect::<Vec<_>>(),
            ["alpha"]
        );
        assert_eq!(load_plugin(&registry, "alpha").await.unwrap().uid(), "alpha");
        assert!(load_plugin(&registry, "beta").await.is_none());
    }
}
