use std::{
    any::{type_name, Any},
    fmt,
    sync::Arc,
};

/// Error type returned by user construction code
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Values may be shared between threads once the container hands them out,
/// so anything injectable needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// A type-erased value produced by a binding
#[derive(Clone)]
pub struct Instance {
    pub type_name: &'static str,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub fn new<T: Injectable>(instance: T) -> Self {
        Instance {
            type_name: type_name::<T>(),
            instance: Arc::new(instance),
        }
    }

    pub fn from_arc<T: Injectable>(instance: Arc<T>) -> Self {
        Instance {
            type_name: type_name::<T>(),
            instance,
        }
    }

    pub(crate) fn from_boxed(
        instance: Box<dyn Any + Send + Sync + 'static>,
        type_name: &'static str,
    ) -> Self {
        Instance {
            type_name,
            instance: Arc::from(instance),
        }
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.type_name),
        }
    }

    /// True if both instances point to the same allocation
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.type_name).finish()
    }
}
