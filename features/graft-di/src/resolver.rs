//! Links bindings to their dependencies
//!
//! Resolution is a fixpoint: a binding that finds a dependency missing is re-enqueued, and the
//! missing key is queued as a [DeferredBinding] placeholder. Placeholders are replaced by a
//! binding synthesized through the [Loader], or by an [UnresolvedBinding] if that fails. Every
//! failure of one pass is reported together.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use tracing::{debug, trace, warn};

use crate::{
    binding::{put_if_absent, Binding, DeferredBinding, SingletonBinding, UnresolvedBinding},
    errors::{ConfigError, GraphError, GraphErrors},
    key::Key,
    loader::Loader,
};

/// Wraps singleton bindings so they memoize their value, other bindings are returned unchanged
///
/// # Panics
/// If the binding is already singleton scoped.
pub fn scope(binding: Arc<dyn Binding>) -> Arc<dyn Binding> {
    if !binding.info().is_singleton() {
        return binding;
    }
    Arc::new(SingletonBinding::new(binding))
}

pub struct Resolver {
    /// Frozen table of the parent container, always fully resolved
    parent: Option<Arc<Resolver>>,
    loader: Arc<dyn Loader>,
    bindings: BTreeMap<Key, Arc<dyn Binding>>,
    queue: VecDeque<Arc<dyn Binding>>,
    attach_success: bool,
    errors: Vec<GraphError>,
}

impl Resolver {
    pub fn new(loader: Arc<dyn Loader>) -> Self {
        Resolver {
            parent: None,
            loader,
            bindings: BTreeMap::new(),
            queue: VecDeque::new(),
            attach_success: true,
            errors: Vec::new(),
        }
    }

    pub fn with_parent(parent: Arc<Resolver>, loader: Arc<dyn Loader>) -> Self {
        Resolver {
            parent: Some(parent),
            ..Resolver::new(loader)
        }
    }

    /// Installs bindings, replacing any binding already installed under the same key
    pub fn install_bindings(&mut self, bindings: impl IntoIterator<Item = (Key, Arc<dyn Binding>)>) {
        for (key, binding) in bindings {
            trace!("Installing binding for {key}");
            self.bindings.insert(key, scope(binding));
        }
    }

    /// Looks up `key` in this resolver and then in its parents
    ///
    /// Returns `None` and enqueues a placeholder if no binding is installed yet. A binding
    /// installed here but not yet resolved is enqueued for resolution and returned.
    pub fn request_binding(
        &mut self,
        key: &Key,
        required_by: &str,
        must_be_injectable: bool,
        library: bool,
    ) -> Option<Arc<dyn Binding>> {
        let binding = match self.bindings.get(key) {
            Some(binding) => {
                if !binding.info().is_resolved() {
                    self.queue.push_back(binding.clone());
                }
                binding.clone()
            }
            None => match self.find_in_parents(key) {
                Some(binding) => {
                    assert!(
                        binding.info().is_resolved(),
                        "Parent binding for '{key}' is not resolved"
                    );
                    binding
                }
                None => {
                    trace!("No binding for {key} required by {required_by}, deferring");
                    let deferred = DeferredBinding::new(key.clone(), required_by, must_be_injectable);
                    deferred.info().set_library(library);
                    deferred.info().set_depended_on(true);
                    self.queue.push_back(Arc::new(deferred));
                    self.attach_success = false;
                    return None;
                }
            },
        };

        // The library flag is only ever raised, never cleared by a later request
        if library {
            binding.info().set_library(true);
        }
        binding.info().set_depended_on(true);
        Some(binding)
    }

    fn find_in_parents(&self, key: &Key) -> Option<Arc<dyn Binding>> {
        let mut current = self.parent.as_deref();
        while let Some(resolver) = current {
            if let Some(binding) = resolver.bindings.get(key) {
                return Some(binding.clone());
            }
            current = resolver.parent.as_deref();
        }
        None
    }

    /// Used by bindings to learn whether the current pass found every dependency
    pub fn is_attach_successful(&self) -> bool {
        self.attach_success
    }

    /// Drains the queue until every enqueued binding is resolved or has failed
    pub fn resolve_enqueued_bindings(&mut self) -> Result<(), GraphErrors> {
        while let Some(binding) = self.queue.pop_front() {
            match binding.as_deferred() {
                Some(deferred) => self.replace_placeholder(deferred),
                // Enqueued more than once, e.g. under its provider and members key
                None if binding.info().is_resolved() => {}
                None => {
                    self.attach_success = true;
                    binding.resolve(self);
                    if self.attach_success {
                        trace!("Resolved {}", binding.info());
                        binding.info().set_resolved();
                    } else {
                        self.queue.push_back(binding);
                    }
                }
            }
        }

        let errors = std::mem::take(&mut self.errors);
        if !errors.is_empty() {
            warn!("Resolution finished with {} errors", errors.len());
        }
        GraphErrors::into_result(errors)
    }

    fn replace_placeholder(&mut self, deferred: &DeferredBinding) {
        let key = deferred.deferred_key();
        if self.bindings.contains_key(key) {
            // Synthesized by an earlier placeholder for the same key
            return;
        }

        match self.create_jit_binding(key, deferred) {
            Ok(binding) => {
                debug!("Synthesized binding for {key}");
                binding.info().set_library(deferred.info().is_library());
                binding.info().set_depended_on(deferred.info().is_depended_on());
                let binding = scope(binding);
                self.queue.push_back(binding.clone());
                put_if_absent(&mut self.bindings, &binding);
            }
            Err(reason) => {
                debug!("Unable to synthesize binding for {key}: {reason}");
                self.errors.push(GraphError::Unsatisfied {
                    key: key.clone(),
                    required_by: deferred.info().required_by().to_string(),
                    reason: reason.clone(),
                });
                let unresolved = UnresolvedBinding::new(key.clone(), deferred.info().required_by(), reason);
                unresolved.info().set_library(deferred.info().is_library());
                unresolved.info().set_depended_on(true);
                unresolved.info().set_resolved();
                self.bindings.insert(key.clone(), Arc::new(unresolved));
            }
        }
    }

    fn create_jit_binding(
        &self,
        key: &Key,
        deferred: &DeferredBinding,
    ) -> Result<Arc<dyn Binding>, ConfigError> {
        let required_by = deferred.info().required_by();
        let binding = if let Some(inner) = key.provider_wrapper_key() {
            self.loader
                .get_provider_of_binding(key, required_by, deferred.must_be_injectable(), inner)?
        } else if let Some(inner) = key.deferred_wrapper_key() {
            self.loader.get_deferred_binding(key, required_by, inner)?
        } else {
            let type_name = key
                .type_name()
                .ok_or_else(|| ConfigError::Qualified(key.clone()))?;
            self.loader
                .get_constructor_binding(key, type_name, deferred.must_be_injectable())?
        };

        if !binding.info().satisfies(key) {
            return Err(ConfigError::KeyMismatch(key.clone()));
        }
        Ok(binding)
    }

    /// Enqueues every installed binding, resolves them and returns a snapshot of the table
    pub fn resolve_all_bindings(
        &mut self,
    ) -> Result<BTreeMap<Key, Arc<dyn Binding>>, GraphErrors> {
        let pending: Vec<_> = self
            .bindings
            .values()
            .filter(|binding| !binding.info().is_resolved())
            .cloned()
            .collect();
        self.queue.extend(pending);
        self.resolve_enqueued_bindings()?;
        Ok(self.bindings.clone())
    }

    /// Bindings installed or synthesized in this resolver
    pub fn bindings(&self) -> &BTreeMap<Key, Arc<dyn Binding>> {
        &self.bindings
    }

    /// Frozen copy of the table, used as the parent of child resolvers
    pub fn snapshot(&self) -> Arc<Resolver> {
        Arc::new(Resolver {
            parent: self.parent.clone(),
            loader: self.loader.clone(),
            bindings: self.bindings.clone(),
            queue: VecDeque::new(),
            attach_success: true,
            errors: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binding::ConstructorBinding,
        errors::InjectError,
        loader::{RegistryLoader, ValidationLoader},
        module::ModuleDescriptor,
    };

    struct Engine;
    struct Car(#[allow(dead_code)] Arc<Engine>);
    struct Unregistered;

    fn loader() -> Arc<dyn Loader> {
        Arc::new(
            RegistryLoader::new()
                .constructor(|| ConstructorBinding::builder::<Engine>().construct(|_| Ok(Engine)))
                .constructor(|| {
                    ConstructorBinding::builder::<Car>()
                        .param::<Arc<Engine>>()
                        .construct(|args| Ok(Car(args.next()?)))
                }),
        )
    }

    #[test]
    fn synthesizes_transitive_dependencies() {
        let mut resolver = Resolver::new(loader());
        assert!(resolver
            .request_binding(&Key::of::<Car>(), "test", true, false)
            .is_none());
        resolver.resolve_enqueued_bindings().unwrap();

        let car = resolver
            .request_binding(&Key::of::<Car>(), "test", true, false)
            .unwrap();
        assert!(car.info().is_resolved());
        assert!(car.get().unwrap().downcast::<Car>().is_ok());

        let engine = &resolver.bindings()[&Key::of::<Engine>()];
        assert!(engine.info().is_resolved());
        assert!(engine.info().is_depended_on());
        assert!(resolver.bindings().contains_key(&Key::members::<Car>()));
    }

    #[test]
    fn failures_are_reported_together_and_recorded() {
        let mut resolver = Resolver::new(loader());
        resolver.request_binding(&Key::of::<Unregistered>(), "first", true, false);
        resolver.request_binding(&Key::named::<Engine>("fast"), "second", true, false);

        let errors = resolver.resolve_enqueued_bindings().unwrap_err().errors;
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&GraphError::Unsatisfied {
            key: Key::named::<Engine>("fast"),
            required_by: "second".into(),
            reason: ConfigError::Qualified(Key::named::<Engine>("fast")),
        }));

        let unresolved = resolver
            .request_binding(&Key::of::<Unregistered>(), "again", true, false)
            .unwrap();
        assert!(matches!(
            unresolved.get(),
            Err(InjectError::Unresolved { .. })
        ));
        // Recorded failures are not reported twice
        resolver.resolve_enqueued_bindings().unwrap();
    }

    #[test]
    fn singleton_bindings_are_scoped_once() {
        let mut module = ModuleDescriptor::new("Test");
        module.provides::<u32>("number").singleton().to(|_| Ok(7));
        let mut group = crate::module::BindingsGroup::standard();
        module.into_bindings(&mut group).unwrap();

        let mut resolver = Resolver::new(Arc::new(ValidationLoader::new(loader())));
        resolver.install_bindings(group.into_parts().0);
        let bindings = resolver.resolve_all_bindings().unwrap();

        let number = &bindings[&Key::of::<u32>()];
        assert!(number.is_scoped());
        assert!(number.get().unwrap().ptr_eq(&number.get().unwrap()));
    }

    #[test]
    #[should_panic(expected = "already singleton scoped")]
    fn scoping_twice_is_rejected() {
        let engine: Arc<dyn Binding> = Arc::new(
            ConstructorBinding::builder::<Engine>()
                .singleton()
                .construct(|_| Ok(Engine)),
        );
        scope(scope(engine));
    }

    #[test]
    fn child_resolvers_see_parent_bindings() {
        let mut parent = Resolver::new(loader());
        parent.request_binding(&Key::of::<Engine>(), "test", true, false);
        parent.resolve_enqueued_bindings().unwrap();
        let parent = parent.snapshot();

        let mut child = Resolver::with_parent(parent.clone(), loader());
        child.request_binding(&Key::of::<Car>(), "test", true, false);
        child.resolve_enqueued_bindings().unwrap();

        assert!(!child.bindings().contains_key(&Key::of::<Engine>()));
        assert!(child.bindings().contains_key(&Key::of::<Car>()));
        assert!(!parent.bindings().contains_key(&Key::of::<Car>()));
    }
}
