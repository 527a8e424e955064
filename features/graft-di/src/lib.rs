//! Dependency injection with a resolved binding graph
//!
//! Modules describe entry points and provider methods, types register their constructors with
//! a [Loader]. A [DiContainer] resolves the graph on demand and constructs values when they are
//! requested. [ModuleGraphValidator] checks module graphs without constructing anything.

pub mod binding;
pub mod builder;
pub mod container;
pub mod dependency_graph;
pub mod errors;
pub mod inject;
pub mod key;
pub mod loader;
pub mod module;
pub mod resolver;
pub mod types;
pub mod validation;

pub use binding::{Binding, BindingInfo, ConstructorBinding, Dependency};
pub use builder::DiBuilder;
pub use container::DiContainer;
pub use dependency_graph::DependencyGraph;
pub use errors::{ConfigError, GraphError, GraphErrors, InjectError};
pub use inject::{Args, Inject, Lazy, Provider, Set};
pub use key::{Key, TypeRef};
pub use loader::{Loader, LoaderChain, RegistryLoader, ValidationLoader};
pub use module::{Module, ModuleDescriptor};
pub use resolver::Resolver;
pub use types::{DynError, Injectable, Instance};
pub use validation::ModuleGraphValidator;
