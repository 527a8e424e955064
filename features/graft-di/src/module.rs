//! Modules declare entry points, includes and provider methods
//!
//! A [Module] only describes itself. The [ModuleDescriptor] it returns is turned into bindings
//! by [ModuleDescriptor::into_bindings], which keeps unique and set bindings apart.

use std::{
    any::type_name,
    collections::{btree_map::Entry, BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    binding::{Binding, ProviderMethodBinding, ProvidesBuilder, Provision, SetBinding},
    errors::ConfigError,
    inject::Inject,
    key::Key,
    loader::Loader,
    types::{Injectable, Instance},
};

pub trait Module: Send + Sync {
    /// Name other modules include this module by
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    fn describe(&self) -> ModuleDescriptor;
}

/// Everything a module contributes to a graph
pub struct ModuleDescriptor {
    name: String,
    entry_points: Vec<Key>,
    includes: Vec<String>,
    complete: bool,
    library: bool,
    overrides: bool,
    provisions: Vec<ProviderMethodBinding>,
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("entry_points", &self.entry_points)
            .field("includes", &self.includes)
            .field("complete", &self.complete)
            .field("library", &self.library)
            .field("overrides", &self.overrides)
            .field("provisions", &self.provisions.len())
            .finish()
    }
}

impl ModuleDescriptor {
    /// An empty, complete, non-library module
    pub fn new(name: impl Into<String>) -> Self {
        ModuleDescriptor {
            name: name.into(),
            entry_points: Vec::new(),
            includes: Vec::new(),
            complete: true,
            library: false,
            overrides: false,
            provisions: Vec::new(),
        }
    }

    /// Descriptor named like [Module::name] of `M`
    pub fn of<M: Module + ?Sized>() -> Self {
        ModuleDescriptor::new(type_name::<M>())
    }

    /// Declares a key that may be requested from the container
    pub fn entry_point(&mut self, key: Key) -> &mut Self {
        self.entry_points.push(key);
        self
    }

    pub fn entry<I: Inject>(&mut self) -> &mut Self {
        self.entry_point(I::key())
    }

    /// Declares injection of properties into existing values of `T`
    pub fn members_entry<T: Injectable>(&mut self) -> &mut Self {
        self.entry_point(Key::members::<T>())
    }

    pub fn include<M: Module>(&mut self) -> &mut Self {
        self.include_named(type_name::<M>())
    }

    pub fn include_named(&mut self, name: impl Into<String>) -> &mut Self {
        self.includes.push(name.into());
        self
    }

    /// Complete modules must satisfy every dependency of their bindings on their own
    pub fn complete(&mut self, complete: bool) -> &mut Self {
        self.complete = complete;
        self
    }

    /// Bindings of library modules are never reported as unused
    pub fn library(&mut self, library: bool) -> &mut Self {
        self.library = library;
        self
    }

    /// Bindings of override modules replace same-keyed bindings of regular modules
    pub fn overrides(&mut self, overrides: bool) -> &mut Self {
        self.overrides = overrides;
        self
    }

    /// Starts declaring a provider method, see [ProvidesBuilder]
    pub fn provides<T: Injectable>(&mut self, method: &str) -> ProvidesBuilder<'_, T> {
        ProvidesBuilder::new(self, method)
    }

    /// Binds `key` to an existing value
    pub fn provides_instance(&mut self, key: Key, instance: Instance) -> &mut Self {
        let binding = ProviderMethodBinding::instance(&self.name, key, instance);
        self.provisions.push(binding);
        self
    }

    pub(crate) fn push_provision(&mut self, binding: ProviderMethodBinding) {
        self.provisions.push(binding);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_points(&self) -> &[Key] {
        &self.entry_points
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_library(&self) -> bool {
        self.library
    }

    pub fn is_overrides(&self) -> bool {
        self.overrides
    }

    /// Adds every provider method to `group`, stopping at the first conflict
    pub fn into_bindings(self, group: &mut BindingsGroup) -> Result<(), ConfigError> {
        let name = self.name;
        for binding in self.provisions {
            binding.info().set_library(self.library);
            let Some(key) = binding.info().provider_key().cloned() else {
                continue;
            };
            let result = match binding.provision() {
                Provision::Unique => group.put(key, Arc::new(binding)),
                Provision::SetElement => group.contribute(key, Arc::new(binding), &name),
            };
            result.map_err(|e| e.in_module(&name))?;
        }
        Ok(())
    }
}

enum GroupEntry {
    Unique(Arc<dyn Binding>),
    Set(SetBinding),
}

impl GroupEntry {
    fn describe(&self) -> String {
        match self {
            GroupEntry::Unique(binding) => binding.info().required_by().to_string(),
            GroupEntry::Set(set) => format!("set binding of {}", set.info()),
        }
    }
}

/// Bindings of one layer of a graph
///
/// A key may be bound once per layer. Override groups replace the regular layer on install
/// and cannot contribute to sets.
pub struct BindingsGroup {
    entries: BTreeMap<Key, GroupEntry>,
    overrides: bool,
}

impl BindingsGroup {
    pub fn standard() -> Self {
        BindingsGroup {
            entries: BTreeMap::new(),
            overrides: false,
        }
    }

    pub fn overrides() -> Self {
        BindingsGroup {
            entries: BTreeMap::new(),
            overrides: true,
        }
    }

    pub fn put(&mut self, key: Key, binding: Arc<dyn Binding>) -> Result<(), ConfigError> {
        match self.entries.entry(key) {
            Entry::Occupied(existing) => Err(ConfigError::Duplicate {
                key: existing.key().clone(),
                existing: existing.get().describe(),
                duplicate: binding.info().required_by().to_string(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(GroupEntry::Unique(binding));
                Ok(())
            }
        }
    }

    /// Adds one element to the set bound under `key`
    pub fn contribute(
        &mut self,
        key: Key,
        contributor: Arc<dyn Binding>,
        module: &str,
    ) -> Result<(), ConfigError> {
        if self.overrides {
            return Err(ConfigError::OverrideSetContribution {
                module: module.to_string(),
                key,
            });
        }
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut existing) => match existing.get_mut() {
                GroupEntry::Set(set) => {
                    set.add(contributor);
                    Ok(())
                }
                GroupEntry::Unique(binding) => Err(ConfigError::Duplicate {
                    key,
                    existing: binding.info().required_by().to_string(),
                    duplicate: contributor.info().required_by().to_string(),
                }),
            },
            Entry::Vacant(vacant) => {
                let mut set = SetBinding::new(key, contributor.info().required_by());
                set.add(contributor);
                vacant.insert(GroupEntry::Set(set));
                Ok(())
            }
        }
    }

    /// Starts the set under the parent's key from the parent's contributions
    pub(crate) fn extend_set(&mut self, parent: &SetBinding) {
        if let Some(key) = parent.info().provider_key() {
            self.entries
                .insert(key.clone(), GroupEntry::Set(SetBinding::extending(parent)));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Bindings to install, plus the set bindings among them
    pub(crate) fn into_parts(self) -> (Vec<(Key, Arc<dyn Binding>)>, Vec<Arc<SetBinding>>) {
        let mut bindings = Vec::with_capacity(self.entries.len());
        let mut sets = Vec::new();
        for (key, entry) in self.entries {
            match entry {
                GroupEntry::Unique(binding) => bindings.push((key, binding)),
                GroupEntry::Set(set) => {
                    let set = Arc::new(set);
                    sets.push(set.clone());
                    bindings.push((key, set as Arc<dyn Binding>));
                }
            }
        }
        (bindings, sets)
    }
}

/// Describes the given modules and everything they include
///
/// Each module name is loaded once, later includes of the same name are skipped.
pub fn load_modules(
    loader: &dyn Loader,
    modules: &[Arc<dyn Module>],
) -> Result<Vec<ModuleDescriptor>, ConfigError> {
    let mut seen = BTreeSet::new();
    let mut descriptors = Vec::new();

    for module in modules {
        if seen.insert(module.name().to_string()) {
            descriptors.push(loader.get_module(module.name(), Some(module.as_ref()))?);
        }
    }

    let mut next = 0;
    while next < descriptors.len() {
        let includes = descriptors[next].includes().to_vec();
        for include in includes {
            if seen.insert(include.clone()) {
                tracing::trace!("Loading included module {include}");
                descriptors.push(loader.get_module(&include, None)?);
            }
        }
        next += 1;
    }

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::ConfigError, loader::RegistryLoader};

    struct Shared;
    impl Module for Shared {
        fn describe(&self) -> ModuleDescriptor {
            let mut module = ModuleDescriptor::of::<Self>();
            module.provides::<u8>("byte").to(|_| Ok(1));
            module
        }
    }

    struct Left;
    impl Module for Left {
        fn describe(&self) -> ModuleDescriptor {
            let mut module = ModuleDescriptor::of::<Self>();
            module.include::<Shared>();
            module
        }
    }

    struct Right;
    impl Module for Right {
        fn describe(&self) -> ModuleDescriptor {
            let mut module = ModuleDescriptor::of::<Self>();
            module.include::<Shared>();
            module
        }
    }

    #[test]
    fn diamond_includes_are_loaded_once() {
        let loader = RegistryLoader::new().module(|| Shared);
        let modules: Vec<Arc<dyn Module>> = vec![Arc::new(Left), Arc::new(Right)];
        let descriptors = load_modules(&loader, &modules).unwrap();
        let names: Vec<_> = descriptors.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(
            names,
            [type_name::<Left>(), type_name::<Right>(), type_name::<Shared>()]
        );
    }

    #[test]
    fn duplicate_keys_in_one_layer_are_rejected() {
        let mut module = ModuleDescriptor::new("Dup");
        module.provides::<u8>("first").to(|_| Ok(1));
        module.provides::<u8>("second").to(|_| Ok(2));

        let mut group = BindingsGroup::standard();
        let error = module.into_bindings(&mut group).unwrap_err();
        let ConfigError::InModule { module, source } = error else {
            panic!("expected a module error");
        };
        assert_eq!(module, "Dup");
        assert!(matches!(
            *source,
            ConfigError::Duplicate { ref existing, ref duplicate, .. }
                if existing == "Dup::first" && duplicate == "Dup::second"
        ));
    }

    #[test]
    fn set_contributions_merge_and_track_library() {
        let mut library = ModuleDescriptor::new("Lib");
        library.library(true);
        library.provides::<u8>("one").into_set().to(|_| Ok(1));

        let mut app = ModuleDescriptor::new("App");
        app.provides::<u8>("two").into_set().to(|_| Ok(2));

        let mut group = BindingsGroup::standard();
        library.into_bindings(&mut group).unwrap();
        app.into_bindings(&mut group).unwrap();

        let (bindings, sets) = group.into_parts();
        assert_eq!(bindings.len(), 1);
        assert_eq!(sets[0].contributors().len(), 2);
        assert!(!sets[0].info().is_library());
    }

    #[test]
    fn override_modules_cannot_contribute_to_sets() {
        let mut module = ModuleDescriptor::new("Test");
        module.overrides(true);
        module.provides::<u8>("one").into_set().to(|_| Ok(1));

        let mut group = BindingsGroup::overrides();
        let error = module.into_bindings(&mut group).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InModule { source, .. }
                if matches!(*source, ConfigError::OverrideSetContribution { .. })
        ));
    }
}
