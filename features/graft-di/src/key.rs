use std::{any::type_name, borrow::Cow, fmt, sync::Arc};

use crate::errors::ConfigError;

/// Raw generic name of the deferred (lazy) wrapper
pub const LAZY_TYPE: &str = "graft_di::Lazy";
/// Raw generic name of the provider-of wrapper
pub const PROVIDER_TYPE: &str = "graft_di::Provider";
/// Raw generic name of multibinding sets
pub const SET_TYPE: &str = "graft_di::Set";

const MEMBERS_PREFIX: &str = "members/";
const QUALIFIER_MARKER: char = '@';

/// Description of a type participating in the graph
///
/// Rust types obtained through [TypeRef::of] are always closed. Generic shapes built by hand
/// may carry unbound parameters, which are rejected when encoded into a [Key].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A concrete type, possibly with generic arguments
    Named {
        name: Cow<'static, str>,
        args: Vec<TypeRef>,
    },
    /// An unbound generic parameter
    Param(Cow<'static, str>),
}

impl TypeRef {
    pub fn of<T: ?Sized + 'static>() -> TypeRef {
        TypeRef::Named {
            name: Cow::Borrowed(type_name::<T>()),
            args: Vec::new(),
        }
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> TypeRef {
        TypeRef::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<Cow<'static, str>>, args: Vec<TypeRef>) -> TypeRef {
        TypeRef::Named {
            name: name.into(),
            args,
        }
    }

    pub fn param(name: impl Into<Cow<'static, str>>) -> TypeRef {
        TypeRef::Param(name.into())
    }

    pub fn lazy(inner: TypeRef) -> TypeRef {
        TypeRef::generic(LAZY_TYPE, vec![inner])
    }

    pub fn provider(inner: TypeRef) -> TypeRef {
        TypeRef::generic(PROVIDER_TYPE, vec![inner])
    }

    pub fn set(inner: TypeRef) -> TypeRef {
        TypeRef::generic(SET_TYPE, vec![inner])
    }

    /// True if no unbound parameter appears anywhere in the type
    pub fn is_closed(&self) -> bool {
        match self {
            TypeRef::Named { args, .. } => args.iter().all(TypeRef::is_closed),
            TypeRef::Param(_) => false,
        }
    }

    fn encode_into(&self, out: &mut String) {
        match self {
            TypeRef::Named { name, args } => {
                out.push_str(name);
                if !args.is_empty() {
                    out.push('<');
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        arg.encode_into(out);
                    }
                    out.push('>');
                }
            }
            TypeRef::Param(name) => out.push_str(name),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.encode_into(&mut out);
        f.write_str(&out)
    }
}

/// Canonical identity of a dependency
///
/// Keys are compared by ordinal string equality, nothing else identifies a dependency.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    /// Encodes a type and an optional qualifier
    ///
    /// Unqualified types without generic arguments map to their name verbatim.
    pub fn for_type(ty: &TypeRef, qualifier: Option<&str>) -> Result<Key, ConfigError> {
        if !ty.is_closed() {
            return Err(ConfigError::OpenGeneric(ty.to_string()));
        }
        Ok(Key::encode(ty, qualifier))
    }

    /// Members-only key of a type, used when only property injection is required
    pub fn member_key(ty: &TypeRef) -> Result<Key, ConfigError> {
        if !ty.is_closed() {
            return Err(ConfigError::OpenGeneric(ty.to_string()));
        }
        let mut out = String::from(MEMBERS_PREFIX);
        ty.encode_into(&mut out);
        Ok(Key(out.into()))
    }

    /// Key of a Rust type
    pub fn of<T: ?Sized + 'static>() -> Key {
        Key(Arc::from(type_name::<T>()))
    }

    /// Qualified key of a Rust type
    pub fn named<T: ?Sized + 'static>(qualifier: &str) -> Key {
        Key::encode(&TypeRef::of::<T>(), Some(qualifier))
    }

    /// Members-only key of a Rust type
    pub fn members<T: ?Sized + 'static>() -> Key {
        Key(format!("{MEMBERS_PREFIX}{}", type_name::<T>()).into())
    }

    pub fn lazy<T: ?Sized + 'static>(qualifier: Option<&str>) -> Key {
        Key::encode(&TypeRef::lazy(TypeRef::of::<T>()), qualifier)
    }

    pub fn provider<T: ?Sized + 'static>(qualifier: Option<&str>) -> Key {
        Key::encode(&TypeRef::provider(TypeRef::of::<T>()), qualifier)
    }

    pub fn set<T: ?Sized + 'static>(qualifier: Option<&str>) -> Key {
        Key::encode(&TypeRef::set(TypeRef::of::<T>()), qualifier)
    }

    /// Infallible encoding, callers guarantee the type is closed
    pub(crate) fn encode(ty: &TypeRef, qualifier: Option<&str>) -> Key {
        match (qualifier, ty) {
            (None, TypeRef::Named { name, args }) if args.is_empty() => Key(Arc::from(&**name)),
            _ => {
                let mut out = String::new();
                if let Some(qualifier) = qualifier {
                    out.push(QUALIFIER_MARKER);
                    out.push_str(qualifier);
                    out.push('/');
                }
                ty.encode_into(&mut out);
                Key(out.into())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the key carries a qualifier
    pub fn is_named(&self) -> bool {
        self.0.starts_with(QUALIFIER_MARKER)
    }

    /// True if the key only requests members injection
    pub fn is_members(&self) -> bool {
        self.0.starts_with(MEMBERS_PREFIX)
    }

    /// Members key for an unqualified provider key
    pub fn to_members(&self) -> Option<Key> {
        if self.is_named() || self.is_members() {
            return None;
        }
        Some(Key(format!("{MEMBERS_PREFIX}{}", self.0).into()))
    }

    /// Type name a constructor binding can be synthesised for
    ///
    /// Qualified keys have none, they must be bound by a provider method.
    pub fn type_name(&self) -> Option<&str> {
        if self.is_named() {
            return None;
        }
        Some(self.0.strip_prefix(MEMBERS_PREFIX).unwrap_or(&self.0))
    }

    /// Inner key if this key denotes a provider-of wrapper
    pub fn provider_wrapper_key(&self) -> Option<Key> {
        self.unwrap_generic(PROVIDER_TYPE)
    }

    /// Inner key if this key denotes a deferred (lazy) wrapper
    pub fn deferred_wrapper_key(&self) -> Option<Key> {
        self.unwrap_generic(LAZY_TYPE)
    }

    /// Strips a wrapper from the trailing type segment, keeping any qualifier in front
    fn unwrap_generic(&self, raw_name: &str) -> Option<Key> {
        if self.is_members() {
            return None;
        }
        let start = self.0.rfind('/').map_or(0, |separator| separator + 1);
        let segment = &self.0[start..];
        let inner = segment
            .strip_prefix(raw_name)?
            .strip_prefix('<')?
            .strip_suffix('>')?;
        Some(Key(format!("{}{}", &self.0[..start], inner).into()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key(Arc::from(value))
    }
}
