use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::catalog::{TypeCatalog, TypeDescriptor};
use crate::entity::Entity;
use crate::error::DbError;
use crate::metadata::EntityMetadata;

///
/// Registry
///
/// Entity metadata indexed by type identity and by table name.
/// Built once; read-only afterwards.
///

#[derive(Debug, Default)]
pub struct Registry {
    by_type: HashMap<TypeId, Arc<EntityMetadata>>,
    by_table: HashMap<String, Arc<EntityMetadata>>,
}

impl Registry {
    /// Build metadata for every entity descriptor in `types`.
    ///
    /// Any invalid declaration aborts the whole build.
    pub fn build(types: impl IntoIterator<Item = TypeDescriptor>) -> Result<Self, DbError> {
        info!("initializing entity registry");
        let mut registry = Self::default();
        for ty in types {
            let Some(descriptor) = ty.entity else {
                continue;
            };
            if registry.by_type.contains_key(&ty.type_id) {
                continue;
            }
            let meta = Arc::new(EntityMetadata::from_descriptor(ty.type_id, ty.path, &descriptor)?);
            if let Some(existing) = registry.by_table.get(meta.table_name()) {
                return Err(DbError::DuplicateTable {
                    table: meta.table_name().to_string(),
                    first: existing.type_path().to_string(),
                    second: meta.type_path().to_string(),
                });
            }
            info!(entity = ty.path, table = meta.table_name(), "found entity type");
            registry.by_table.insert(meta.table_name().to_string(), Arc::clone(&meta));
            registry.by_type.insert(ty.type_id, meta);
        }
        info!(entities = registry.len(), "entity registry ready");
        Ok(registry)
    }

    /// Build from the entity types the catalog discovers.
    pub fn from_catalog(catalog: &TypeCatalog) -> Result<Self, DbError> {
        Self::build(catalog.entities())
    }

    pub fn by_type(&self, type_id: TypeId) -> Option<&Arc<EntityMetadata>> {
        self.by_type.get(&type_id)
    }

    pub fn by_table(&self, table: &str) -> Option<&Arc<EntityMetadata>> {
        self.by_table.get(table)
    }

    pub fn metadata<T: Entity>(&self) -> Result<&Arc<EntityMetadata>, DbError> {
        self.by_type(TypeId::of::<T>())
            .ok_or_else(|| DbError::UnknownEntity(std::any::type_name::<T>().to_string()))
    }

    pub fn table(&self, table: &str) -> Result<&Arc<EntityMetadata>, DbError> {
        self.by_table(table)
            .ok_or_else(|| DbError::UnknownTable(table.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityMetadata>> {
        self.by_type.values()
    }
}
