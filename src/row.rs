//! Result rows and their materialization into entity instances.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::DbError;
use crate::metadata::EntityMetadata;
use crate::value::Value;

/// One decoded result row: column names in physical order plus nullable values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// `values` must line up with `columns`.
    ///
    /// # Panics
    ///
    /// When the two lengths differ.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "row has {} columns but {} values",
            columns.len(),
            values.len()
        );
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    /// Iterate `(column, value)` pairs in physical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

/// Turns rows into fresh instances of `T` through its metadata.
pub struct RowMaterializer<'a, T> {
    metadata: &'a EntityMetadata,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T: Entity> RowMaterializer<'a, T> {
    pub fn new(metadata: &'a EntityMetadata) -> Self {
        Self {
            metadata,
            _entity: PhantomData,
        }
    }

    /// Build a new `T` from one row.
    ///
    /// Unmapped columns are ignored and null values leave the property at its
    /// default. The first failing mutator aborts the row.
    pub fn materialize(&self, row: &Row) -> Result<T, DbError> {
        let mut entity = T::default();
        for (column, value) in row.iter() {
            if value.is_null() {
                continue;
            }
            let Some(mapping) = self.metadata.mapping_for_column(column) else {
                continue;
            };
            let wrap = |source| DbError::Materialize {
                entity: self.metadata.type_path().to_string(),
                column: column.to_string(),
                source,
            };
            let value = mapping.coerce(value.clone()).map_err(wrap)?;
            entity.set(&mapping.property, value).map_err(wrap)?;
        }
        Ok(entity)
    }
}
