/// Errors when registering or retrieving configs
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigRegistryError {
    /// The config type is already registered
    #[error("The config type '{0}' is already registered")]
    AlreadyRegistered(&'static str),
    /// The stored config does not have the requested type
    #[error("The config registered for '{0}' has a different type")]
    TypeMismatch(&'static str),
}
