//! Validation of module graphs without constructing anything
//!
//! Complete modules must bind every dependency of their bindings themselves, since the
//! [ValidationLoader] never synthesizes constructor bindings. Modules that are not libraries
//! are also checked for bindings nothing uses.

use std::{collections::BTreeMap, sync::Arc};

use tracing::debug;

use crate::{
    binding::Binding,
    dependency_graph::DependencyGraph,
    errors::{ConfigError, GraphError, GraphErrors},
    key::Key,
    loader::{Loader, ValidationLoader},
    module::{BindingsGroup, Module, ModuleDescriptor},
    resolver::Resolver,
};

pub struct ModuleGraphValidator {
    modules: Arc<dyn Loader>,
}

impl ModuleGraphValidator {
    /// `modules` is used to describe included modules
    pub fn new(modules: Arc<dyn Loader>) -> Self {
        ModuleGraphValidator { modules }
    }

    /// Validates every root module, collecting the problems of all of them
    pub fn validate(&self, roots: &[Arc<dyn Module>]) -> Result<(), GraphErrors> {
        let mut errors = Vec::new();
        for root in roots {
            if let Err(found) = self.validate_module(root.as_ref()) {
                errors.extend(found.errors);
            }
        }
        GraphErrors::into_result(errors)
    }

    pub fn validate_module(&self, root: &dyn Module) -> Result<(), GraphErrors> {
        let descriptor = self
            .modules
            .get_module(root.name(), Some(root))
            .map_err(GraphError::from)?;
        debug!("Validating module {}", descriptor.name());

        let mut errors = Vec::new();
        if descriptor.is_complete() {
            match self.process_module(root, false) {
                Ok(graph) => {
                    if let Err(cycles) = graph.detect_cycles() {
                        errors.extend(cycles.errors);
                    }
                }
                Err(found) => errors.extend(found.errors),
            }
        }

        if !descriptor.is_library() {
            // Configuration problems were already reported by the completeness pass
            let report_config = !descriptor.is_complete();
            match self.process_module(root, true) {
                Ok(graph) => {
                    if let Err(unused) = graph.detect_unused_bindings() {
                        errors.extend(unused.errors);
                    }
                }
                Err(found) if report_config => errors.extend(found.errors),
                Err(_) => {}
            }
        }

        GraphErrors::into_result(errors)
    }

    /// The root and every module it includes, each module once
    ///
    /// Fails if a module includes itself, directly or through other modules.
    pub fn gather_included_modules(
        &self,
        root: &dyn Module,
    ) -> Result<Vec<ModuleDescriptor>, ConfigError> {
        let mut result = Vec::new();
        let mut path = Vec::new();
        self.gather_recursively(root.name(), Some(root), &mut result, &mut path)?;
        Ok(result)
    }

    fn gather_recursively(
        &self,
        name: &str,
        instance: Option<&dyn Module>,
        result: &mut Vec<ModuleDescriptor>,
        path: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        if path.iter().any(|entry| entry == name) {
            let chain = if path.len() == 1 {
                vec![name.to_string()]
            } else {
                std::iter::once(name.to_string())
                    .chain(path.iter().rev().cloned())
                    .collect()
            };
            return Err(ConfigError::ModuleCycle { chain });
        }
        if result.iter().any(|module| module.name() == name) {
            return Ok(());
        }

        let descriptor = self.modules.get_module(name, instance)?;
        let includes = descriptor.includes().to_vec();
        result.push(descriptor);

        path.push(name.to_string());
        for include in &includes {
            self.gather_recursively(include, None, result, path)?;
        }
        path.pop();
        Ok(())
    }

    /// Resolves the bindings of `root` and its includes from its entry points
    ///
    /// With `ignore_completeness_errors`, missing bindings do not fail the pass.
    fn process_module(
        &self,
        root: &dyn Module,
        ignore_completeness_errors: bool,
    ) -> Result<ResolvedGraph, GraphErrors> {
        let descriptors = self
            .gather_included_modules(root)
            .map_err(GraphError::from)?;

        let mut errors = Vec::new();
        let mut entry_points: Vec<(Key, String)> = Vec::new();
        let mut base = BindingsGroup::standard();
        let mut overrides = BindingsGroup::overrides();
        for descriptor in descriptors {
            let name = descriptor.name().to_string();
            entry_points.extend(
                descriptor
                    .entry_points()
                    .iter()
                    .map(|key| (key.clone(), name.clone())),
            );
            let group = if descriptor.is_overrides() {
                &mut overrides
            } else {
                &mut base
            };
            if let Err(error) = descriptor.into_bindings(group) {
                errors.push(GraphError::from(error));
            }
        }

        let mut resolver = Resolver::new(Arc::new(ValidationLoader::new(self.modules.clone())));
        resolver.install_bindings(base.into_parts().0);
        resolver.install_bindings(overrides.into_parts().0);

        for (key, module) in &entry_points {
            resolver.request_binding(key, module, false, true);
        }
        let bindings = match resolver.resolve_all_bindings() {
            Ok(bindings) => bindings,
            Err(found) => {
                if !ignore_completeness_errors {
                    errors.extend(found.errors);
                }
                resolver.bindings().clone()
            }
        };

        GraphErrors::into_result(errors)?;
        Ok(ResolvedGraph { bindings })
    }
}

/// Keeps the resolved bindings alive while the graph is checked
struct ResolvedGraph {
    bindings: BTreeMap<Key, Arc<dyn Binding>>,
}

impl ResolvedGraph {
    fn detect_cycles(&self) -> Result<(), GraphErrors> {
        DependencyGraph::new(self.bindings.values()).detect_cycles()
    }

    fn detect_unused_bindings(&self) -> Result<(), GraphErrors> {
        DependencyGraph::new(self.bindings.values()).detect_unused_bindings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::RegistryLoader;

    struct SelfIncluding;
    impl Module for SelfIncluding {
        fn describe(&self) -> ModuleDescriptor {
            let mut module = ModuleDescriptor::of::<Self>();
            module.include::<SelfIncluding>();
            module
        }
    }

    struct First;
    impl Module for First {
        fn describe(&self) -> ModuleDescriptor {
            let mut module = ModuleDescriptor::new("First");
            module.include_named("Second");
            module
        }
        fn name(&self) -> &'static str {
            "First"
        }
    }

    struct Second;
    impl Module for Second {
        fn describe(&self) -> ModuleDescriptor {
            let mut module = ModuleDescriptor::new("Second");
            module.include_named("First");
            module
        }
    }

    struct NamedLoader;
    impl Loader for NamedLoader {
        fn get_constructor_binding(
            &self,
            _key: &Key,
            type_name: &str,
            _must_be_injectable: bool,
        ) -> Result<Arc<dyn Binding>, ConfigError> {
            Err(ConfigError::UnknownType(type_name.to_string()))
        }

        fn get_module(
            &self,
            name: &str,
            instance: Option<&dyn Module>,
        ) -> Result<ModuleDescriptor, ConfigError> {
            match (instance, name) {
                (Some(module), _) => Ok(module.describe()),
                (None, "First") => Ok(First.describe()),
                (None, "Second") => Ok(Second.describe()),
                (None, other) => Err(ConfigError::UnknownModule(other.to_string())),
            }
        }
    }

    #[test]
    fn direct_self_inclusion() {
        let validator =
            ModuleGraphValidator::new(Arc::new(RegistryLoader::new().module(|| SelfIncluding)));
        let error = validator.gather_included_modules(&SelfIncluding).unwrap_err();
        assert_eq!(
            error,
            ConfigError::ModuleCycle {
                chain: vec![std::any::type_name::<SelfIncluding>().to_string()]
            }
        );
    }

    #[test]
    fn indirect_inclusion_cycle() {
        let validator = ModuleGraphValidator::new(Arc::new(NamedLoader));
        let error = validator.gather_included_modules(&First).unwrap_err();
        assert_eq!(
            error,
            ConfigError::ModuleCycle {
                chain: vec!["First".into(), "Second".into(), "First".into()]
            }
        );
    }
}
