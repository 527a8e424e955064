use std::sync::Arc;

use graft_di::{
    ConstructorBinding, DiBuilder, DynError, Module, ModuleDescriptor, Provider, RegistryLoader,
};

fn main() -> Result<(), DynError> {
    let loader = RegistryLoader::new().constructor(|| {
        ConstructorBinding::builder::<Test>()
            .param::<Arc<String>>()
            .construct(|args| Ok(Test { a: args.next()? }))
    });

    let app = DiBuilder::new()
        .loader(loader)
        .add_instance("test".to_string())
        .add_module(AppModule)
        .build()?;

    let t = app.require::<Test>()?;
    println!("{:?}", t);

    let greetings = app.get::<Provider<Greeting>>()?;
    println!("{:?} {:?}", greetings.get()?, greetings.get()?);
    println!("{:?}", app);
    Ok(())
}

#[derive(Debug)]
struct Test {
    #[allow(dead_code)]
    a: Arc<String>,
}

#[derive(Debug)]
struct Greeting(#[allow(dead_code)] String);

struct AppModule;
impl Module for AppModule {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module
            .entry::<Arc<Test>>()
            .entry::<Provider<Greeting>>()
            .complete(false);
        module
            .provides::<Greeting>("greeting")
            .param::<Arc<String>>()
            .to(|args| {
                let name: Arc<String> = args.next()?;
                Ok(Greeting(format!("Hello {name}")))
            });
        module
    }
}
