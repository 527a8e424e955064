use thiserror::Error;

use crate::{key::Key, types::DynError};

/// Errors in the shape of the configuration, detected at install or synthesis time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{0}' has unbound generic parameters, only closed types can be bound")]
    OpenGeneric(String),
    #[error("Duplicate bindings for '{key}':\n    {existing}\n    {duplicate}")]
    Duplicate {
        key: Key,
        existing: String,
        duplicate: String,
    },
    #[error("'{0}' is qualified and must be bound by a provider method")]
    Qualified(Key),
    #[error("'{0}' has no injectable members - register an injectable constructor")]
    NotInjectable(String),
    #[error("No binding is registered for type '{0}'")]
    UnknownType(String),
    #[error("Unable to create binding for '{0}'")]
    KeyMismatch(Key),
    #[error("Module '{0}' is not known to the loader")]
    UnknownModule(String),
    #[error("Override module '{module}' cannot contribute to the set binding '{key}'")]
    OverrideSetContribution { module: String, key: Key },
    #[error("Module inclusion cycle: {}", render_inclusion_chain(.chain))]
    ModuleCycle { chain: Vec<String> },
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("{module}: {source}")]
    InModule {
        module: String,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    pub(crate) fn in_module(self, module: &str) -> ConfigError {
        ConfigError::InModule {
            module: module.to_string(),
            source: Box::new(self),
        }
    }
}

/// `chain` is ordered from the repeated module down to the module that included it again
fn render_inclusion_chain(chain: &[String]) -> String {
    match chain {
        [single] => format!("{single} includes itself directly"),
        _ => {
            let mut lines = Vec::new();
            for (i, pair) in chain.windows(2).enumerate() {
                lines.push(format!("\n{i}. {} included by {}", pair[0], pair[1]));
            }
            if let Some(first) = chain.first() {
                lines.push(format!("\n0. {first}"));
            }
            lines.concat()
        }
    }
}

/// Problems found while resolving or verifying a binding graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("No binding for '{key}' required by '{required_by}': {reason}")]
    Unsatisfied {
        key: Key,
        required_by: String,
        reason: ConfigError,
    },
    #[error("Dependency cycle: {}", render_cycle(.path))]
    Cycle { path: Vec<String> },
    #[error("Unused binding '{key}' declared by '{declared_by}'")]
    Unused { key: String, declared_by: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn render_cycle(path: &[String]) -> String {
    let mut rendered = path.join(" -> ");
    if let Some(first) = path.first() {
        rendered.push_str(" -> ");
        rendered.push_str(first);
    }
    rendered
}

/// Every problem found by one resolution or validation pass
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct GraphErrors {
    pub errors: Vec<GraphError>,
}

impl GraphErrors {
    pub(crate) fn into_result(errors: Vec<GraphError>) -> Result<(), GraphErrors> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GraphErrors { errors })
        }
    }
}

impl std::fmt::Display for GraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

impl From<GraphError> for GraphErrors {
    fn from(error: GraphError) -> Self {
        GraphErrors {
            errors: vec![error],
        }
    }
}

/// Errors when requesting or constructing values
#[derive(Error, Debug)]
pub enum InjectError {
    /// The key was not declared as an entry point by any module
    #[error("'{0}' is not an entry point - add it to the entry points of one of the modules")]
    NotAnEntryPoint(Key),
    /// Resolving the graph for the request failed
    #[error(transparent)]
    Graph(#[from] GraphErrors),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A binding whose synthesis failed was used
    #[error("'{key}' could not be resolved: {reason}")]
    Unresolved { key: Key, reason: ConfigError },
    #[error("Unsupported operation on '{key}': {operation}")]
    Unsupported { key: String, operation: &'static str },
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    /// A dependency edge outlived the container owning its binding
    #[error("The binding for '{0}' is no longer owned by a container")]
    Detached(String),
    /// Too few resolved arguments were handed to construction code
    #[error("No argument left for '{0}'")]
    MissingArgument(&'static str),
    /// User construction code failed, the original error is kept untouched
    #[error("Constructing '{key}' failed: {error}")]
    Construction {
        key: String,
        #[source]
        error: DynError,
    },
}

impl InjectError {
    /// Recovers an [InjectError] that travelled through user code as a [DynError]
    pub(crate) fn from_construction(key: impl std::fmt::Display, error: DynError) -> InjectError {
        match error.downcast::<InjectError>() {
            Ok(inject_error) => *inject_error,
            Err(error) => InjectError::Construction {
                key: key.to_string(),
                error,
            },
        }
    }
}
