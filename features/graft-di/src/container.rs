use std::{
    collections::BTreeMap,
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::debug;

use crate::{
    binding::{Binding, SetBinding},
    dependency_graph::DependencyGraph,
    errors::{ConfigError, GraphErrors, InjectError},
    inject::Inject,
    key::Key,
    loader::Loader,
    module::{load_modules, BindingsGroup, Module},
    resolver::Resolver,
    types::Injectable,
};

/// Container of a resolved module graph
///
/// Values are created on request. Only keys declared as entry points by one of the modules
/// can be requested.
#[derive(Clone)]
pub struct DiContainer(pub Arc<DiContainerInner>);
pub struct DiContainerInner {
    parent: Option<DiContainer>,
    loader: Arc<dyn Loader>,
    resolver: Mutex<Resolver>,
    /// Entry point keys and the module declaring them
    entry_points: BTreeMap<Key, String>,
    set_bindings: Vec<Arc<SetBinding>>,
}

impl Debug for DiContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resolver = self.resolver();
        let mut map = f.debug_struct("DiContainer");
        for (key, binding) in resolver.bindings() {
            let state = if binding.info().is_resolved() {
                "resolved"
            } else {
                "pending"
            };
            map.field(key.as_str(), &state);
        }
        map.finish()
    }
}

impl DiContainer {
    /// Loads the modules and everything they include and installs their bindings
    pub fn create(
        loader: Arc<dyn Loader>,
        modules: &[Arc<dyn Module>],
    ) -> Result<DiContainer, ConfigError> {
        Self::make(None, loader, modules)
    }

    fn make(
        parent: Option<(DiContainer, Arc<Resolver>)>,
        loader: Arc<dyn Loader>,
        modules: &[Arc<dyn Module>],
    ) -> Result<DiContainer, ConfigError> {
        let descriptors = load_modules(loader.as_ref(), modules)?;

        let mut base = BindingsGroup::standard();
        let mut overrides = BindingsGroup::overrides();
        if let Some((parent, _)) = &parent {
            for set in &parent.0.set_bindings {
                base.extend_set(set);
            }
        }

        let mut entry_points = BTreeMap::new();
        for descriptor in descriptors {
            for key in descriptor.entry_points() {
                entry_points.insert(key.clone(), descriptor.name().to_string());
            }
            let group = if descriptor.is_overrides() {
                &mut overrides
            } else {
                &mut base
            };
            descriptor.into_bindings(group)?;
        }

        let (parent, mut resolver) = match parent {
            Some((container, frozen)) => (
                Some(container),
                Resolver::with_parent(frozen, loader.clone()),
            ),
            None => (None, Resolver::new(loader.clone())),
        };
        let (base_bindings, set_bindings) = base.into_parts();
        resolver.install_bindings(base_bindings);
        resolver.install_bindings(overrides.into_parts().0);
        debug!(
            "Created container with {} bindings and {} entry points",
            resolver.bindings().len(),
            entry_points.len()
        );

        Ok(Self(Arc::new(DiContainerInner {
            parent,
            loader,
            resolver: Mutex::new(resolver),
            entry_points,
            set_bindings,
        })))
    }

    /// Attempts to get the requested entry point
    pub fn get<I: Inject>(&self) -> Result<I, InjectError> {
        I::from_instance(self.get_key(&I::key())?)
    }

    pub fn get_named<I: Inject>(&self, qualifier: &str) -> Result<I, InjectError> {
        I::from_instance(self.get_key(&I::named_key(qualifier))?)
    }

    /// Attempts to get the requested type
    pub fn require<T: Injectable>(&self) -> Result<Arc<T>, InjectError> {
        self.get::<Arc<T>>()
    }

    pub fn get_key(&self, key: &Key) -> Result<crate::types::Instance, InjectError> {
        let binding = self.entry_point_binding(key)?;
        binding.get()
    }

    /// Injects the properties of an existing value
    pub fn inject<T: Injectable>(&self, target: &mut T) -> Result<(), InjectError> {
        let binding = self.entry_point_binding(&Key::members::<T>())?;
        binding.inject_properties(target)
    }

    /// Resolves every binding and checks the graph for cycles
    pub fn validate(&self) -> Result<(), GraphErrors> {
        let mut resolver = self.resolver();
        let bindings = resolver.resolve_all_bindings()?;
        DependencyGraph::new(bindings.values()).detect_cycles()
    }

    /// Creates a child container
    ///
    /// The child sees every binding of this container as it is now. Set bindings are copied,
    /// so contributions of the child's modules do not leak into this container.
    pub fn plus(&self, modules: &[Arc<dyn Module>]) -> Result<DiContainer, InjectError> {
        let frozen = {
            let mut resolver = self.resolver();
            let bindings = resolver.resolve_all_bindings()?;
            DependencyGraph::new(bindings.values()).detect_cycles()?;
            resolver.snapshot()
        };
        Ok(Self::make(
            Some((self.clone(), frozen)),
            self.0.loader.clone(),
            modules,
        )?)
    }

    /// Graph of the bindings resolved so far
    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::new(self.resolver().bindings().values())
    }

    pub fn parent(&self) -> Option<&DiContainer> {
        self.0.parent.as_ref()
    }

    fn resolver(&self) -> MutexGuard<'_, Resolver> {
        self.0
            .resolver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Module declaring `key` as an entry point, here or in a parent
    ///
    /// Members and provider keys of one type count as the same entry point.
    fn entry_point_module(&self, key: &Key) -> Option<String> {
        let provider_key = key
            .type_name()
            .filter(|_| key.is_members())
            .map(Key::from);
        let candidates = [Some(key.clone()), key.to_members(), provider_key];

        let mut container = Some(self);
        while let Some(current) = container {
            for candidate in candidates.iter().flatten() {
                if let Some(module) = current.0.entry_points.get(candidate) {
                    return Some(module.clone());
                }
            }
            container = current.0.parent.as_ref();
        }
        None
    }

    /// Resolves the binding of an entry point and checks it for cycles
    fn entry_point_binding(&self, key: &Key) -> Result<Arc<dyn Binding>, InjectError> {
        let module = self
            .entry_point_module(key)
            .ok_or_else(|| InjectError::NotAnEntryPoint(key.clone()))?;

        let mut resolver = self.resolver();
        let binding = match resolver.request_binding(key, &module, false, true) {
            Some(binding) if binding.info().is_resolved() => binding,
            _ => {
                resolver.resolve_enqueued_bindings()?;
                resolver
                    .request_binding(key, &module, false, true)
                    .ok_or_else(|| InjectError::Unresolved {
                        key: key.clone(),
                        reason: ConfigError::KeyMismatch(key.clone()),
                    })?
            }
        };
        // Lazy and provider handles report no edges, so the whole resolved table is checked
        // to catch cycles behind them. Memoized bindings are skipped.
        let resolved: Vec<_> = resolver
            .bindings()
            .values()
            .filter(|binding| binding.info().is_resolved())
            .cloned()
            .collect();
        DependencyGraph::new(std::iter::once(&binding).chain(&resolved)).detect_cycles()?;
        Ok(binding)
    }
}
