use std::sync::Arc;

use graft_config::{Config, ConfigProvider, ConfigRegistryError};
use graft_di::{
    ConstructorBinding, DiBuilder, InjectError, Module, ModuleDescriptor, ModuleGraphValidator,
    RegistryLoader,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Debug, PartialEq)]
struct DatabaseConfig {
    url: String,
}

#[derive(Clone, Debug)]
struct UnusedConfig;

struct Database {
    url: String,
}

struct DatabaseModule;
impl Module for DatabaseModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.entry::<Arc<Database>>().complete(false);
        module
    }
}

fn configs() -> ConfigProvider {
    let mut configs = ConfigProvider::initialize();
    configs
        .add_config(DatabaseConfig {
            url: "postgres://localhost".into(),
        })
        .unwrap()
        .add_config(UnusedConfig)
        .unwrap();
    configs
}

#[test]
fn registry_rejects_duplicates() {
    let mut configs = configs();
    assert_eq!(
        configs.add_config(UnusedConfig).err(),
        Some(ConfigRegistryError::AlreadyRegistered(std::any::type_name::<UnusedConfig>()))
    );
    configs.maybe_add_config::<u8>(None).unwrap();
    assert_eq!(configs.len(), 2);
    assert_eq!(configs.get_config::<u8>().unwrap(), None);
}

#[test]
fn named_configs_are_separate_entries() {
    let mut configs = ConfigProvider::initialize();
    configs
        .add_named_config("replica", DatabaseConfig { url: "replica".into() })
        .unwrap()
        .add_config(DatabaseConfig { url: "primary".into() })
        .unwrap();
    assert!(configs
        .add_named_config("replica", DatabaseConfig { url: "again".into() })
        .is_err());

    let container = DiBuilder::new().add_module(configs).build().unwrap();
    assert_eq!(
        container
            .get_named::<Config<DatabaseConfig>>("replica")
            .unwrap()
            .url,
        "replica"
    );
    assert_eq!(container.get::<Config<DatabaseConfig>>().unwrap().url, "primary");
}

#[test]
fn configs_are_injected_into_constructors() {
    init_tracing();
    let loader = RegistryLoader::new().constructor(|| {
        ConstructorBinding::builder::<Database>()
            .param::<Config<DatabaseConfig>>()
            .construct(|args| {
                let config: Config<DatabaseConfig> = args.next()?;
                Ok(Database {
                    url: config.url.clone(),
                })
            })
    });

    let container = DiBuilder::new()
        .loader(loader)
        .add_module(configs())
        .add_module(DatabaseModule)
        .build()
        .unwrap();

    assert_eq!(container.require::<Database>().unwrap().url, "postgres://localhost");
    let config = container.get::<Config<DatabaseConfig>>().unwrap();
    assert_eq!(config.url, "postgres://localhost");
}

#[test]
fn missing_configs_are_unsatisfied() {
    let loader = RegistryLoader::new().constructor(|| {
        ConstructorBinding::builder::<Database>()
            .param::<Config<DatabaseConfig>>()
            .construct(|args| {
                let config: Config<DatabaseConfig> = args.next()?;
                Ok(Database {
                    url: config.url.clone(),
                })
            })
    });

    let container = DiBuilder::new()
        .loader(loader)
        .add_module(DatabaseModule)
        .build()
        .unwrap();

    assert!(matches!(
        container.require::<Database>(),
        Err(InjectError::Graph(_))
    ));
}

#[test]
fn config_modules_are_libraries() {
    let validator = ModuleGraphValidator::new(Arc::new(RegistryLoader::new()));
    validator.validate_module(&configs()).unwrap();
}
