use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use graft_di::{
    ConstructorBinding, DiBuilder, DynError, GraphError, InjectError, Key, Lazy, Module,
    ModuleDescriptor, Provider, RegistryLoader, Set,
};

mod common;

struct StringModule {
    singleton: bool,
}

impl Module for StringModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.entry::<Arc<String>>();
        let provides = module.provides::<String>("string");
        let provides = if self.singleton {
            provides.singleton()
        } else {
            provides
        };
        provides.to(|_| Ok(String::from("value")));
        module
    }
}

#[test]
fn unscoped_provider_methods_create_new_values() {
    common::init_tracing();
    let container = DiBuilder::new()
        .add_module(StringModule { singleton: false })
        .build()
        .unwrap();

    let first = container.require::<String>().unwrap();
    let second = container.require::<String>().unwrap();
    assert_eq!(*first, "value");
    assert_eq!(first, second);
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn singleton_provider_methods_share_one_value() {
    let container = DiBuilder::new()
        .add_module(StringModule { singleton: true })
        .build()
        .unwrap();

    let first = container.require::<String>().unwrap();
    let second = container.require::<String>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn only_entry_points_can_be_requested() {
    let container = DiBuilder::new()
        .add_module(StringModule { singleton: false })
        .build()
        .unwrap();
    assert!(matches!(
        container.require::<u32>(),
        Err(InjectError::NotAnEntryPoint(key)) if key == Key::of::<u32>()
    ));
}

struct Flaky;

struct FlakyModule {
    attempts: Arc<AtomicUsize>,
}

impl Module for FlakyModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.entry::<Arc<Flaky>>();
        let attempts = self.attempts.clone();
        module
            .provides::<Flaky>("flaky")
            .singleton()
            .to(move |_| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err("first attempt fails".into());
                }
                Ok(Flaky)
            });
        module
    }
}

#[test]
fn failed_singletons_are_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let container = DiBuilder::new()
        .add_module(FlakyModule {
            attempts: attempts.clone(),
        })
        .build()
        .unwrap();

    let Err(InjectError::Construction { key, error }) = container.require::<Flaky>() else {
        panic!("the first construction should fail");
    };
    assert!(key.ends_with("::flaky"));
    assert_eq!(error.to_string(), "first attempt fails");

    let first = container.require::<Flaky>().unwrap();
    let second = container.require::<Flaky>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

struct Engine {
    serial: usize,
}

struct Car {
    engine: Arc<Engine>,
}

struct VehicleModule;
impl Module for VehicleModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module
            .entry::<Arc<Car>>()
            .entry::<Provider<Engine>>()
            .entry::<Provider<Car>>()
            .entry::<Lazy<Engine>>()
            .complete(false);
        module
    }
}

fn vehicle_loader(built: Arc<AtomicUsize>) -> RegistryLoader {
    RegistryLoader::new()
        .constructor(move || {
            let built = built.clone();
            ConstructorBinding::builder::<Engine>().construct(move |_| {
                Ok(Engine {
                    serial: built.fetch_add(1, Ordering::SeqCst),
                })
            })
        })
        .constructor(|| {
            ConstructorBinding::builder::<Car>()
                .param::<Arc<Engine>>()
                .singleton()
                .construct(|args| {
                    Ok(Car {
                        engine: args.next()?,
                    })
                })
        })
}

#[test]
fn constructor_bindings_are_synthesized() {
    let built = Arc::new(AtomicUsize::new(0));
    let container = DiBuilder::new()
        .loader(vehicle_loader(built.clone()))
        .add_module(VehicleModule)
        .build()
        .unwrap();

    let car = container.require::<Car>().unwrap();
    assert_eq!(car.engine.serial, 0);
    assert!(Arc::ptr_eq(&car, &container.require::<Car>().unwrap()));
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn providers_and_lazies_defer_construction() {
    let built = Arc::new(AtomicUsize::new(0));
    let container = DiBuilder::new()
        .loader(vehicle_loader(built.clone()))
        .add_module(VehicleModule)
        .build()
        .unwrap();

    let lazy = container.get::<Lazy<Engine>>().unwrap();
    assert!(!lazy.is_initialized());
    assert_eq!(built.load(Ordering::SeqCst), 0);
    let engine = lazy.get().unwrap();
    assert!(Arc::ptr_eq(&engine, &lazy.clone().get().unwrap()));

    let provider = container.get::<Provider<Engine>>().unwrap();
    assert_ne!(provider.get().unwrap().serial, provider.get().unwrap().serial);
    assert_eq!(built.load(Ordering::SeqCst), 3);
}

#[test]
fn providers_detach_from_dropped_containers() {
    let container = DiBuilder::new()
        .loader(vehicle_loader(Arc::new(AtomicUsize::new(0))))
        .add_module(VehicleModule)
        .build()
        .unwrap();
    let provider = container.get::<Provider<Car>>().unwrap();
    assert!(provider.get().is_ok());

    drop(container);
    // The singleton keeps its value, new construction needs the container
    assert!(provider.get().is_ok());

    let container = DiBuilder::new()
        .loader(vehicle_loader(Arc::new(AtomicUsize::new(0))))
        .add_module(VehicleModule)
        .build()
        .unwrap();
    let provider = container.get::<Provider<Car>>().unwrap();
    drop(container);
    assert!(matches!(provider.get(), Err(InjectError::Detached(_))));
}

struct Plugin(&'static str);

struct CoreModule;
impl Module for CoreModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.entry::<Set<Plugin>>();
        module
            .provides::<Plugin>("core")
            .into_set()
            .to(|_| Ok(Plugin("core")));
        module
    }
}

struct ExtraModule;
impl Module for ExtraModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.entry::<Set<Plugin>>();
        module
            .provides::<Plugin>("extra")
            .into_set()
            .to(|_| Ok(Plugin("extra")));
        module
    }
}

fn plugin_names(plugins: &Set<Plugin>) -> Vec<&'static str> {
    plugins.iter().map(|plugin| plugin.0).collect()
}

#[test]
fn set_contributions_are_merged() {
    let container = DiBuilder::new()
        .add_module(CoreModule)
        .add_module(ExtraModule)
        .build()
        .unwrap();
    let plugins = container.get::<Set<Plugin>>().unwrap();
    assert_eq!(plugin_names(&plugins), ["core", "extra"]);
}

#[test]
fn child_containers_extend_sets_without_leaking() {
    let parent = DiBuilder::new().add_module(CoreModule).build().unwrap();
    let child = parent
        .plus(&[Arc::new(ExtraModule) as Arc<dyn Module>])
        .unwrap();

    assert_eq!(
        plugin_names(&child.get::<Set<Plugin>>().unwrap()),
        ["core", "extra"]
    );
    assert_eq!(plugin_names(&parent.get::<Set<Plugin>>().unwrap()), ["core"]);
}

struct Greeting(String);

struct GreetingModule;
impl Module for GreetingModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.entry::<Arc<Greeting>>();
        module
            .provides::<Greeting>("greeting")
            .param::<Arc<String>>()
            .to(|args| {
                let name: Arc<String> = args.next()?;
                Ok(Greeting(format!("Hello {name}")))
            });
        module
            .provides::<String>("name")
            .to(|_| Ok(String::from("production")));
        module
    }
}

struct TestOverrides;
impl Module for TestOverrides {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.overrides(true);
        module
            .provides::<String>("name")
            .to(|_| Ok(String::from("test")));
        module
    }
}

#[test]
fn override_modules_replace_bindings() {
    let container = DiBuilder::new()
        .add_module(GreetingModule)
        .add_module(TestOverrides)
        .build()
        .unwrap();
    assert_eq!(container.require::<Greeting>().unwrap().0, "Hello test");
}

#[test]
fn child_containers_use_parent_bindings() {
    let parent = DiBuilder::new()
        .add_named_instance("region", String::from("eu"))
        .build()
        .unwrap();

    struct RegionModule;
    impl Module for RegionModule {
        fn describe(&self) -> ModuleDescriptor {
            let mut module = ModuleDescriptor::of::<Self>();
            module.entry::<Arc<Greeting>>().complete(false);
            module
                .provides::<Greeting>("greeting")
                .named_param::<Arc<String>>("region")
                .to(|args| {
                    let region: Arc<String> = args.next()?;
                    Ok(Greeting(format!("Hello {region}")))
                });
            module
        }
    }

    let child = parent
        .plus(&[Arc::new(RegionModule) as Arc<dyn Module>])
        .unwrap();
    assert_eq!(child.require::<Greeting>().unwrap().0, "Hello eu");
    assert_eq!(
        *child.get_named::<Arc<String>>("region").unwrap(),
        "eu"
    );
}

struct Unbound;

struct NeedsUnbound;
impl Module for NeedsUnbound {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.entry::<Arc<Greeting>>().complete(false);
        module
            .provides::<Greeting>("greeting")
            .param::<Arc<Unbound>>()
            .named_param::<Arc<String>>("missing")
            .to(|_| Ok(Greeting(String::new())));
        module
    }
}

#[test]
fn unsatisfied_dependencies_fail_consistently() {
    let container = DiBuilder::new().add_module(NeedsUnbound).build().unwrap();

    let Err(InjectError::Graph(errors)) = container.require::<Greeting>() else {
        panic!("resolution should fail");
    };
    assert_eq!(errors.errors.len(), 2);
    assert!(errors.errors.iter().any(|error| matches!(
        error,
        GraphError::Unsatisfied { key, required_by, .. }
            if *key == Key::named::<String>("missing") && required_by.ends_with("NeedsUnbound::greeting")
    )));

    assert!(matches!(
        container.require::<Greeting>(),
        Err(InjectError::Unresolved { .. })
    ));
}

struct Ping {
    pong: Provider<Pong>,
}
struct Pong {
    ping: Arc<Ping>,
}

struct PingPongModule;
impl Module for PingPongModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.entry::<Arc<Ping>>();
        module
            .provides::<Ping>("ping")
            .singleton()
            .param::<Provider<Pong>>()
            .to(|args| Ok(Ping { pong: args.next()? }));
        module
            .provides::<Pong>("pong")
            .param::<Arc<Ping>>()
            .to(|args| Ok(Pong { ping: args.next()? }));
        module
    }
}

#[test]
fn providers_break_dependency_cycles() {
    let container = DiBuilder::new().add_module(PingPongModule).build().unwrap();
    container.validate().unwrap();

    let ping = container.require::<Ping>().unwrap();
    let pong = ping.pong.get().unwrap();
    assert!(Arc::ptr_eq(&ping, &pong.ping));
}

struct Chicken;
struct Egg;

struct CycleModule;
impl Module for CycleModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.entry::<Arc<Chicken>>().entry::<Provider<Chicken>>();
        module
            .provides::<Chicken>("chicken")
            .param::<Arc<Egg>>()
            .to(|_| Ok(Chicken));
        module
            .provides::<Egg>("egg")
            .param::<Arc<Chicken>>()
            .to(|_| Ok(Egg));
        module
    }
}

#[test]
fn cycles_are_rejected_on_every_request() {
    let container = DiBuilder::new().add_module(CycleModule).build().unwrap();
    for _ in 0..2 {
        let Err(InjectError::Graph(errors)) = container.require::<Chicken>() else {
            panic!("cycle should be detected");
        };
        assert!(matches!(&errors.errors[..], [GraphError::Cycle { path }] if path.len() == 2));
    }
}

#[test]
fn cycles_behind_providers_are_rejected() {
    let container = DiBuilder::new().add_module(CycleModule).build().unwrap();
    let Err(InjectError::Graph(errors)) = container.get::<Provider<Chicken>>() else {
        panic!("cycle behind the provider should be detected");
    };
    assert!(matches!(&errors.errors[..], [GraphError::Cycle { .. }]));
}

#[test]
fn validation_does_not_hide_cycles() {
    let container = DiBuilder::new().add_module(CycleModule).build().unwrap();
    assert!(container.validate().is_err());
    assert!(container.validate().is_err());
    assert!(matches!(
        container.require::<Chicken>(),
        Err(InjectError::Graph(_))
    ));
}

#[derive(Default)]
struct Base {
    name: Option<Arc<String>>,
}

#[derive(Default)]
struct Screen {
    base: Base,
    title: Option<Arc<String>>,
}

struct ScreenModule;
impl Module for ScreenModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.members_entry::<Screen>().complete(false);
        module
            .provides::<String>("text")
            .to(|_| Ok(String::from("text")));
        module
    }
}

#[test]
fn members_injection_covers_embedded_values() -> Result<(), DynError> {
    let loader = RegistryLoader::new()
        .constructor(|| {
            ConstructorBinding::builder::<Base>()
                .property(|base: &mut Base, name: Arc<String>| base.name = Some(name))
                .members_only()
        })
        .constructor(|| {
            ConstructorBinding::builder::<Screen>()
                .property(|screen: &mut Screen, title: Arc<String>| screen.title = Some(title))
                .base(|screen: &mut Screen| &mut screen.base)
                .members_only()
        });
    let container = DiBuilder::new()
        .loader(loader)
        .add_module(ScreenModule)
        .build()?;

    let mut screen = Screen::default();
    container.inject(&mut screen)?;
    assert_eq!(screen.title.as_deref().map(String::as_str), Some("text"));
    assert_eq!(screen.base.name.as_deref().map(String::as_str), Some("text"));
    Ok(())
}
