//! Nodes of the binding graph
//!
//! Every variant implements [Binding]. The resolver only relies on the trait, so new variants can
//! be added by a [Loader](crate::loader::Loader) without touching it.

use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock, Weak,
    },
};

use crate::{errors::InjectError, key::Key, resolver::Resolver, types::Instance};

pub mod constructor;
pub mod deferred;
pub mod lazy;
pub mod provider;
pub mod provides;
pub mod set;
pub mod singleton;
pub mod unresolved;

pub use constructor::{ConstructorBinding, ConstructorBuilder};
pub use deferred::DeferredBinding;
pub use lazy::LazyBinding;
pub use provider::ProviderOfBinding;
pub use provides::{ProviderMethodBinding, ProvidesBuilder, Provision};
pub use set::SetBinding;
pub use singleton::SingletonBinding;
pub use unresolved::UnresolvedBinding;

/// A graph node describing how to produce or inject one dependency
pub trait Binding: Send + Sync {
    /// Keys and state flags of the binding
    fn info(&self) -> &BindingInfo;

    /// Requests every dependency from the resolver
    ///
    /// Called again until a pass finds every dependency present. Only the wiring of the last
    /// call is kept.
    fn resolve(&self, resolver: &mut Resolver) {
        let _ = resolver;
    }

    /// Produces or returns the value
    fn get(&self) -> Result<Instance, InjectError>;

    /// Injects properties into an already constructed value
    fn inject_properties(&self, target: &mut dyn Any) -> Result<(), InjectError> {
        let _ = target;
        Err(InjectError::Unsupported {
            key: self.info().to_string(),
            operation: "property injection",
        })
    }

    /// Reports the bindings used by `get` and `inject_properties`
    fn dependencies(&self, into: &mut Vec<Arc<dyn Binding>>) {
        let _ = into;
    }

    /// True for bindings that already memoize their value
    fn is_scoped(&self) -> bool {
        false
    }

    /// Only implemented by [DeferredBinding]
    fn as_deferred(&self) -> Option<&DeferredBinding> {
        None
    }
}

impl fmt::Debug for dyn Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Binding({})", self.info())
    }
}

/// Keys, provenance and independent state flags of a binding
pub struct BindingInfo {
    provider_key: Option<Key>,
    members_key: Option<Key>,
    required_by: String,
    singleton: bool,
    resolved: AtomicBool,
    visiting: AtomicBool,
    cycle_free: AtomicBool,
    library: AtomicBool,
    depended_on: AtomicBool,
}

impl BindingInfo {
    pub fn new(
        provider_key: Option<Key>,
        members_key: Option<Key>,
        singleton: bool,
        required_by: impl Into<String>,
    ) -> Self {
        BindingInfo {
            provider_key,
            members_key,
            required_by: required_by.into(),
            singleton,
            resolved: AtomicBool::new(false),
            visiting: AtomicBool::new(false),
            cycle_free: AtomicBool::new(false),
            library: AtomicBool::new(false),
            depended_on: AtomicBool::new(false),
        }
    }

    pub fn provider_key(&self) -> Option<&Key> {
        self.provider_key.as_ref()
    }

    pub fn members_key(&self) -> Option<&Key> {
        self.members_key.as_ref()
    }

    /// True if the binding satisfies the key either way
    pub fn satisfies(&self, key: &Key) -> bool {
        self.provider_key.as_ref() == Some(key) || self.members_key.as_ref() == Some(key)
    }

    pub fn required_by(&self) -> &str {
        &self.required_by
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    pub fn set_resolved(&self) {
        self.resolved.store(true, Ordering::Release)
    }

    pub fn is_visiting(&self) -> bool {
        self.visiting.load(Ordering::Acquire)
    }

    pub fn set_visiting(&self, visiting: bool) {
        self.visiting.store(visiting, Ordering::Release)
    }

    pub fn is_cycle_free(&self) -> bool {
        self.cycle_free.load(Ordering::Acquire)
    }

    pub fn set_cycle_free(&self, cycle_free: bool) {
        self.cycle_free.store(cycle_free, Ordering::Release)
    }

    pub fn is_library(&self) -> bool {
        self.library.load(Ordering::Acquire)
    }

    pub fn set_library(&self, library: bool) {
        self.library.store(library, Ordering::Release)
    }

    pub fn is_depended_on(&self) -> bool {
        self.depended_on.load(Ordering::Acquire)
    }

    pub fn set_depended_on(&self, depended_on: bool) {
        self.depended_on.store(depended_on, Ordering::Release)
    }
}

impl fmt::Display for BindingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.provider_key, &self.members_key) {
            (Some(key), _) | (None, Some(key)) => write!(f, "{key}"),
            (None, None) => f.write_str("<unkeyed>"),
        }
    }
}

/// One dependency to request while resolving
#[derive(Debug, Clone)]
pub struct Dependency {
    pub key: Key,
    pub must_be_injectable: bool,
    pub library: bool,
}

impl Dependency {
    pub fn new(key: Key) -> Self {
        Dependency {
            key,
            must_be_injectable: true,
            library: false,
        }
    }
}

/// Dependency edges of a binding
///
/// Edges are weak, the owning resolver keeps bindings alive. This lets cyclic graphs that are
/// broken by `Provider`/`Lazy` handles be released with their container.
#[derive(Default)]
pub struct Links(RwLock<Option<Vec<Weak<dyn Binding>>>>);

impl Links {
    /// Requests every dependency and stores the edges if all of them are present
    ///
    /// All dependencies are requested even after a miss, so every missing key is enqueued in
    /// the same pass.
    pub fn request_all<'a>(
        &self,
        resolver: &mut Resolver,
        dependencies: impl IntoIterator<Item = &'a Dependency>,
        required_by: &str,
    ) -> bool {
        let mut found = Vec::new();
        let mut complete = true;
        for dependency in dependencies {
            match resolver.request_binding(
                &dependency.key,
                required_by,
                dependency.must_be_injectable,
                dependency.library,
            ) {
                Some(binding) => found.push(Arc::downgrade(&binding)),
                None => complete = false,
            }
        }

        let mut links = self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *links = complete.then_some(found);
        complete
    }

    /// Strong references to the linked bindings, empty if never linked
    pub fn bindings(&self) -> Vec<Arc<dyn Binding>> {
        let links = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        links
            .iter()
            .flatten()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Strong references in declaration order, failing if an edge is missing
    pub fn upgrade(&self, owner: &BindingInfo) -> Result<Vec<Arc<dyn Binding>>, InjectError> {
        let links = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(links) = links.as_ref() else {
            return Err(InjectError::Detached(owner.to_string()));
        };
        links
            .iter()
            .map(|link| {
                link.upgrade()
                    .ok_or_else(|| InjectError::Detached(owner.to_string()))
            })
            .collect()
    }

    /// Values of every linked binding, in declaration order
    pub fn values(&self, owner: &BindingInfo) -> Result<Vec<Instance>, InjectError> {
        self.upgrade(owner)?
            .iter()
            .map(|binding| binding.get())
            .collect()
    }
}

/// Inserts `binding` into the table under its keys unless a binding is already present
pub(crate) fn put_if_absent(
    table: &mut std::collections::BTreeMap<Key, Arc<dyn Binding>>,
    binding: &Arc<dyn Binding>,
) {
    let info = binding.info();
    for key in [info.provider_key(), info.members_key()].into_iter().flatten() {
        table
            .entry(key.clone())
            .or_insert_with(|| binding.clone());
    }
}
