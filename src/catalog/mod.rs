//! Discovery of entity types.
//!
//! # Intention
//!
//! - Enumerate candidate type paths under a namespace from one or more
//!   [`TypeSource`]s, resolve them through a [`TypeLoader`], and keep the ones
//!   accepted by a caller-supplied predicate.
//! - No SQL or persistence knowledge lives here; the registry supplies the predicate.
//!
//! Types become resolvable either by linking a registration into the binary
//! ([`register_entity!`](crate::register_entity)) or by inserting them into an
//! explicit loader.

mod source;

pub use source::{
    DeploymentArchive, DescriptorArchive, DescriptorDirectory, LinkedTypes, TypeSource,
};

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use tracing::trace;

use crate::entity::{simple_name, Entity, EntityDescriptor};

/// File extension of descriptor entries in directories and archives.
pub const DESCRIPTOR_EXTENSION: &str = ".type";

///
/// TypeDescriptor
///
/// A resolvable type: its path, identity and, for entities, their declared metadata.
///

#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    pub path: &'static str,
    pub type_id: TypeId,
    pub entity: Option<EntityDescriptor>,
}

impl TypeDescriptor {
    pub fn entity<T: Entity>() -> Self {
        Self {
            path: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            entity: Some(T::DESCRIPTOR),
        }
    }

    /// A type without persistence metadata.
    pub fn plain<T: 'static>() -> Self {
        Self {
            path: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            entity: None,
        }
    }

    pub fn simple_name(&self) -> &'static str {
        simple_name(self.path)
    }

    pub fn is_entity(&self) -> bool {
        self.entity.is_some()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("path", &self.path)
            .field("entity", &self.is_entity())
            .finish()
    }
}

static LINKED: Mutex<Vec<TypeDescriptor>> = Mutex::new(Vec::new());

/// Record a type as linked into this process. Called by the registration macros.
pub fn link_type(ty: TypeDescriptor) {
    LINKED
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .push(ty);
}

///
/// TypeLoader
///
/// Resolves type paths to descriptors.
///

#[derive(Debug, Clone, Default)]
pub struct TypeLoader {
    types: HashMap<&'static str, TypeDescriptor>,
}

impl TypeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every type registered at program load.
    pub fn linked() -> Self {
        let linked = LINKED
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut loader = Self::new();
        for ty in linked.iter() {
            loader.insert(*ty);
        }
        loader
    }

    pub fn with(mut self, ty: TypeDescriptor) -> Self {
        self.insert(ty);
        self
    }

    pub fn insert(&mut self, ty: TypeDescriptor) {
        self.types.insert(ty.path, ty);
    }

    pub fn resolve(&self, path: &str) -> Option<TypeDescriptor> {
        self.types.get(path).copied()
    }

    pub fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.keys().copied()
    }
}

///
/// Namespace
///
/// A `::`-separated path prefix; empty matches every type.
///

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(prefix: &str) -> Self {
        Self(prefix.trim_end_matches("::").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.is_empty()
            || path == self.0
            || path
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with("::"))
    }
}

/// Convert a descriptor entry such as `app/model/User.type` to `app::model::User`.
pub(crate) fn descriptor_path(entry: &str) -> Option<String> {
    let stem = entry.strip_suffix(DESCRIPTOR_EXTENSION)?;
    let stem = stem.trim_start_matches(|c: char| c == '/' || c == '\\');
    if stem.is_empty() {
        return None;
    }
    Some(stem.replace(|c: char| c == '/' || c == '\\', "::"))
}

///
/// TypeCatalog
///
/// Scans its sources under one namespace.
///

pub struct TypeCatalog {
    namespace: Namespace,
    loader: TypeLoader,
    sources: Vec<Box<dyn TypeSource>>,
}

impl TypeCatalog {
    pub fn new(namespace: &str, loader: TypeLoader) -> Self {
        Self {
            namespace: Namespace::new(namespace),
            loader,
            sources: Vec::new(),
        }
    }

    /// Catalog over the types linked into this process.
    pub fn linked(namespace: &str) -> Self {
        Self::new(namespace, TypeLoader::linked()).with_source(LinkedTypes)
    }

    pub fn with_source(mut self, source: impl TypeSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Distinct resolvable types accepted by `accept`, ordered by path.
    ///
    /// Paths that do not resolve are skipped.
    pub fn scan(&self, accept: impl Fn(&TypeDescriptor) -> bool) -> Vec<TypeDescriptor> {
        let mut found: HashMap<TypeId, TypeDescriptor> = HashMap::new();
        for source in &self.sources {
            for path in source.enumerate(&self.namespace, &self.loader) {
                if !self.namespace.contains(&path) {
                    continue;
                }
                let Some(ty) = self.loader.resolve(&path) else {
                    trace!(path = %path, "skipping unresolvable type");
                    continue;
                };
                if found.contains_key(&ty.type_id) || !accept(&ty) {
                    continue;
                }
                found.insert(ty.type_id, ty);
            }
        }
        let mut types: Vec<TypeDescriptor> = found.into_values().collect();
        types.sort_by(|a, b| a.path.cmp(b.path));
        types
    }

    /// Types carrying persistence metadata.
    pub fn entities(&self) -> Vec<TypeDescriptor> {
        self.scan(TypeDescriptor::is_entity)
    }
}

/// Link entity types into the process so [`TypeLoader::linked`] can resolve them.
///
/// ```ignore
/// rust_sqlite_orm::register_entity!(User, Product);
/// ```
#[macro_export]
macro_rules! register_entity {
    ($($ty:ty),+ $(,)?) => {
        #[$crate::__reexports::ctor::ctor(
            unsafe,
            anonymous,
            crate_path = $crate::__reexports::ctor
        )]
        fn __register_entities() {
            $(
                $crate::catalog::link_type($crate::catalog::TypeDescriptor::entity::<$ty>());
            )+
        }
    };
}

/// Link types without persistence metadata.
#[macro_export]
macro_rules! register_type {
    ($($ty:ty),+ $(,)?) => {
        #[$crate::__reexports::ctor::ctor(
            unsafe,
            anonymous,
            crate_path = $crate::__reexports::ctor
        )]
        fn __register_types() {
            $(
                $crate::catalog::link_type($crate::catalog::TypeDescriptor::plain::<$ty>());
            )+
        }
    };
}
