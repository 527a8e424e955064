//! Graft Config provides a registry of configs that can be injected into the rest of the
//! modules.
//!
//! Graft Config is split into two major parts:
//! 1. ConfigProvider: Used to create the registry of all configs, installed as a library module
//! 2. Config<T>: A wrapper type to be able to resolve and retrieve configs
//!
//! # Examples
//!
//! ```rust
//! use graft_config::ConfigProvider;
//!
//! #[derive(Clone)]
//! struct AppConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! let app_config = AppConfig {
//!     host: "localhost".to_string(),
//!     port: 8080_u16,
//! };
//!
//! let mut config_provider = ConfigProvider::initialize();
//! config_provider.add_config(app_config.clone()).unwrap();
//!
//! let retrieved_config = config_provider.get_config::<AppConfig>().unwrap().unwrap();
//! assert_eq!(app_config.host, retrieved_config.host);
//! assert_eq!(app_config.port, retrieved_config.port);
//! ```

pub mod config;
pub mod errors;
pub mod provider;

pub use config::Config;
pub use errors::ConfigRegistryError;
pub use provider::ConfigProvider;
