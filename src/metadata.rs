//! Per-type mapping metadata derived from an [`EntityDescriptor`].

use std::any::TypeId;
use std::collections::HashMap;

use crate::entity::{simple_name, Accessor, Entity, EntityDescriptor, ScalarKind, ValueKind};
use crate::error::DbError;
use crate::statement::StatementCache;
use crate::value::{PropertyError, Value};

/// Correspondence between one entity property and one table column.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMapping {
    pub property: String,
    pub column_name: String,
    pub insertable: bool,
    pub updatable: bool,
    pub is_identifier: bool,
    pub is_version: bool,
    pub length: Option<u32>,
    pub kind: ValueKind,
}

impl PropertyMapping {
    fn from_accessor(accessor: &Accessor) -> Self {
        let column = accessor.column.unwrap_or_default();
        Self {
            property: accessor.property.to_string(),
            column_name: column.name.unwrap_or(accessor.property).to_string(),
            insertable: column.insertable,
            updatable: column.updatable,
            is_identifier: accessor.id,
            is_version: accessor.version,
            length: column.length,
            kind: accessor.kind,
        }
    }

    /// Coerce a decoded column value to what the mutator expects.
    pub fn coerce(&self, value: Value) -> Result<Value, PropertyError> {
        match (self.kind, value) {
            (ValueKind::Enum(symbols), Value::Text(symbol)) => {
                if symbols.iter().any(|s| *s == symbol) {
                    Ok(Value::Text(symbol))
                } else {
                    Err(PropertyError::UnknownSymbol {
                        symbol,
                        target: "enum",
                    })
                }
            }
            (ValueKind::Enum(_), other) => Err(PropertyError::TypeMismatch {
                expected: "text",
                found: other.type_name(),
            }),
            (ValueKind::Scalar(ScalarKind::Boolean), Value::Integer(i)) => {
                Ok(Value::Boolean(i != 0))
            }
            (ValueKind::Scalar(ScalarKind::Real), Value::Integer(i)) => Ok(Value::Real(i as f64)),
            (ValueKind::Scalar(ScalarKind::Integer), Value::Boolean(b)) => {
                Ok(Value::Integer(i64::from(b)))
            }
            (_, other) => Ok(other),
        }
    }
}

/// Immutable mapping metadata for one entity type.
///
/// Built once per type when the registry is constructed; the statement cache it
/// owns is the only part populated afterwards.
#[derive(Debug)]
pub struct EntityMetadata {
    type_id: TypeId,
    type_path: &'static str,
    table_name: String,
    id_property: String,
    version_property: Option<String>,
    mappings: HashMap<String, PropertyMapping>,
    columns: HashMap<String, String>,
    folded_columns: HashMap<String, String>,
    statements: StatementCache,
}

impl EntityMetadata {
    /// Derive metadata for a concrete entity type.
    pub fn of<T: Entity>() -> Result<Self, DbError> {
        Self::from_descriptor(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            &T::DESCRIPTOR,
        )
    }

    pub(crate) fn from_descriptor(
        type_id: TypeId,
        type_path: &'static str,
        descriptor: &EntityDescriptor,
    ) -> Result<Self, DbError> {
        let table_name = descriptor
            .table
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| simple_name(type_path))
            .to_string();

        let retained: Vec<&Accessor> = descriptor
            .accessors
            .iter()
            .filter(|a| !a.transient)
            .collect();

        let mut id_property: Option<&str> = None;
        for accessor in retained.iter().filter(|a| a.id) {
            if let Some(first) = id_property {
                return Err(DbError::DuplicateIdentifier {
                    entity: type_path.to_string(),
                    first: first.to_string(),
                    second: accessor.property.to_string(),
                });
            }
            id_property = Some(accessor.property);
        }
        let id_property = id_property.ok_or_else(|| DbError::MissingIdentifier {
            entity: type_path.to_string(),
        })?;

        let mut mappings = HashMap::with_capacity(retained.len());
        let mut columns = HashMap::with_capacity(retained.len());
        let mut folded_columns: HashMap<String, String> = HashMap::with_capacity(retained.len());
        let mut version_property = None;
        for accessor in retained {
            if !descriptor.mutators.contains(&accessor.property) {
                return Err(DbError::MissingMutator {
                    entity: type_path.to_string(),
                    property: accessor.property.to_string(),
                });
            }
            if accessor.version && version_property.is_none() {
                version_property = Some(accessor.property.to_string());
            }
            let mapping = PropertyMapping::from_accessor(accessor);

            // SQLite column names are case-insensitive.
            let folded = mapping.column_name.to_ascii_lowercase();
            if let Some(first) = folded_columns.get(&folded) {
                return Err(DbError::DuplicateColumn {
                    entity: type_path.to_string(),
                    column: mapping.column_name,
                    first: first.clone(),
                    second: mapping.property,
                });
            }
            folded_columns.insert(folded, mapping.property.clone());
            columns.insert(mapping.column_name.clone(), mapping.property.clone());
            mappings.insert(mapping.property.clone(), mapping);
        }

        Ok(Self {
            type_id,
            type_path,
            table_name,
            id_property: id_property.to_string(),
            version_property,
            mappings,
            columns,
            folded_columns,
            statements: StatementCache::default(),
        })
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully-qualified type path, for diagnostics.
    pub fn type_path(&self) -> &'static str {
        self.type_path
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn id_property(&self) -> &str {
        &self.id_property
    }

    pub fn id_mapping(&self) -> &PropertyMapping {
        &self.mappings[&self.id_property]
    }

    pub fn version_property(&self) -> Option<&str> {
        self.version_property.as_deref()
    }

    pub fn mapping(&self, property: &str) -> Option<&PropertyMapping> {
        self.mappings.get(property)
    }

    /// Mapped properties ordered by property name.
    pub fn sorted_mappings(&self) -> Vec<&PropertyMapping> {
        let mut all: Vec<&PropertyMapping> = self.mappings.values().collect();
        all.sort_by(|a, b| a.property.cmp(&b.property));
        all
    }

    /// Resolve a result column to its mapping, exact name first, then ignoring ASCII case.
    pub fn mapping_for_column(&self, column: &str) -> Option<&PropertyMapping> {
        let property = match self.columns.get(column) {
            Some(property) => property,
            None => self.folded_columns.get(&column.to_ascii_lowercase())?,
        };
        self.mappings.get(property)
    }

    pub(crate) fn statements(&self) -> &StatementCache {
        &self.statements
    }

    /// Read a property for binding. Enum values must be one of the declared symbols.
    pub(crate) fn read<T: Entity>(
        &self,
        entity: &T,
        mapping: &PropertyMapping,
    ) -> Result<Value, DbError> {
        let value = entity
            .get(&mapping.property)
            .ok_or_else(|| DbError::UnknownProperty {
                entity: self.type_path.to_string(),
                property: mapping.property.clone(),
            })?;
        if let ValueKind::Enum(symbols) = mapping.kind {
            match &value {
                Value::Null => {}
                Value::Text(symbol) if symbols.iter().any(|s| *s == symbol.as_str()) => {}
                other => {
                    return Err(DbError::InvalidEnumSymbol {
                        entity: self.type_path.to_string(),
                        property: mapping.property.clone(),
                        symbol: match other {
                            Value::Text(s) => s.clone(),
                            v => format!("{v:?}"),
                        },
                    })
                }
            }
        }
        Ok(value)
    }

    pub(crate) fn read_id<T: Entity>(&self, entity: &T) -> Result<Value, DbError> {
        self.read(entity, self.id_mapping())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ColumnOverride;
    use crate::error::ErrorClass;

    const STATUS: &[&str] = &["Active", "Locked"];

    fn metadata(descriptor: &EntityDescriptor) -> Result<EntityMetadata, DbError> {
        EntityMetadata::from_descriptor(TypeId::of::<()>(), "app::model::Account", descriptor)
    }

    #[test]
    fn derives_table_and_columns() {
        const D: EntityDescriptor = EntityDescriptor::new(
            &[
                Accessor::new("id", ValueKind::INTEGER).id(),
                Accessor::new("css_style", ValueKind::TEXT)
                    .column(ColumnOverride::named("css_style_name")),
                Accessor::new("created", ValueKind::INTEGER)
                    .column(ColumnOverride::DEFAULT.updatable(false)),
                Accessor::new("version", ValueKind::INTEGER).version(),
                Accessor::new("display", ValueKind::TEXT).transient(),
            ],
            &["id", "css_style", "created", "version"],
        );
        let meta = metadata(&D).unwrap();
        assert_eq!(meta.table_name(), "Account");
        assert_eq!(meta.id_property(), "id");
        assert_eq!(meta.version_property(), Some("version"));
        assert_eq!(meta.mapping("css_style").unwrap().column_name, "css_style_name");
        assert!(!meta.mapping("created").unwrap().updatable);
        assert!(meta.mapping("created").unwrap().insertable);
        assert!(meta.mapping("display").is_none());
        assert_eq!(
            meta.mapping_for_column("CSS_STYLE_NAME").map(|m| m.property.as_str()),
            Some("css_style")
        );
        assert!(meta.mapping_for_column("extra").is_none());
    }

    #[test]
    fn explicit_table_name_wins() {
        const D: EntityDescriptor =
            EntityDescriptor::new(&[Accessor::new("id", ValueKind::INTEGER).id()], &["id"])
                .table("accounts");
        assert_eq!(metadata(&D).unwrap().table_name(), "accounts");
    }

    #[test]
    fn rejects_missing_identifier() {
        const D: EntityDescriptor =
            EntityDescriptor::new(&[Accessor::new("name", ValueKind::TEXT)], &["name"]);
        let err = metadata(&D).unwrap_err();
        assert!(matches!(err, DbError::MissingIdentifier { .. }));
        assert_eq!(err.class(), ErrorClass::Configuration);
    }

    #[test]
    fn rejects_duplicate_identifier() {
        const D: EntityDescriptor = EntityDescriptor::new(
            &[
                Accessor::new("id", ValueKind::INTEGER).id(),
                Accessor::new("code", ValueKind::TEXT).id(),
            ],
            &["id", "code"],
        );
        match metadata(&D).unwrap_err() {
            DbError::DuplicateIdentifier { first, second, .. } => {
                assert_eq!(first, "id");
                assert_eq!(second, "code");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_accessor_without_mutator() {
        const D: EntityDescriptor = EntityDescriptor::new(
            &[
                Accessor::new("id", ValueKind::INTEGER).id(),
                Accessor::new("name", ValueKind::TEXT),
                Accessor::new("label", ValueKind::TEXT).transient(),
            ],
            &["id"],
        );
        match metadata(&D).unwrap_err() {
            DbError::MissingMutator { property, .. } => assert_eq!(property, "name"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn coerces_enum_and_scalars() {
        const D: EntityDescriptor = EntityDescriptor::new(
            &[
                Accessor::new("id", ValueKind::INTEGER).id(),
                Accessor::new("status", ValueKind::Enum(STATUS)),
                Accessor::new("active", ValueKind::BOOLEAN),
                Accessor::new("score", ValueKind::REAL),
            ],
            &["id", "status", "active", "score"],
        );
        let meta = metadata(&D).unwrap();
        let status = meta.mapping("status").unwrap();
        assert_eq!(status.coerce(Value::Text("Locked".into())), Ok(Value::Text("Locked".into())));
        assert!(matches!(
            status.coerce(Value::Text("Gone".into())),
            Err(PropertyError::UnknownSymbol { .. })
        ));
        assert!(matches!(
            status.coerce(Value::Integer(1)),
            Err(PropertyError::TypeMismatch { .. })
        ));
        assert_eq!(
            meta.mapping("active").unwrap().coerce(Value::Integer(0)),
            Ok(Value::Boolean(false))
        );
        assert_eq!(meta.mapping("score").unwrap().coerce(Value::Integer(3)), Ok(Value::Real(3.0)));
    }

    #[test]
    fn rejects_two_properties_on_one_column() {
        const D: EntityDescriptor = EntityDescriptor::new(
            &[
                Accessor::new("id", ValueKind::INTEGER).id(),
                Accessor::new("title", ValueKind::TEXT),
                Accessor::new("heading", ValueKind::TEXT).column(ColumnOverride::named("Title")),
            ],
            &["id", "title", "heading"],
        );
        let err = metadata(&D).unwrap_err();
        match &err {
            DbError::DuplicateColumn {
                column,
                first,
                second,
                ..
            } => {
                assert_eq!(column, "Title");
                assert_eq!(first, "title");
                assert_eq!(second, "heading");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.class(), ErrorClass::Configuration);
    }
}
