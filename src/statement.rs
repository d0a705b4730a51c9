//! SQL generation for entity operations.
//!
//! Templates are a pure function of [`EntityMetadata`]; each one is built on first
//! use and memoized in the metadata's [`StatementCache`].

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::entity::Entity;
use crate::error::DbError;
use crate::metadata::{EntityMetadata, PropertyMapping};
use crate::value::Value;

const LIMIT_CLAUSE: &str = " limit ?,?";

/// SQL text plus the ordered properties supplying its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplate {
    pub sql: Arc<str>,
    pub properties: Vec<String>,
}

/// A statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlOperation {
    pub sql: Arc<str>,
    pub params: Vec<Value>,
}

impl SqlOperation {
    pub fn new(sql: impl Into<Arc<str>>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Lazily built statement templates for one entity.
#[derive(Debug, Default)]
pub struct StatementCache {
    select_by_id: OnceLock<Arc<str>>,
    delete_by_id: OnceLock<Arc<str>>,
    insert: OnceLock<StatementTemplate>,
    update: OnceLock<Option<StatementTemplate>>,
}

// -- select * from TABLE where id=?

fn select_by_id_sql(meta: &EntityMetadata) -> Arc<str> {
    format!(
        "select * from {} where {}=?",
        meta.table_name(),
        meta.id_mapping().column_name
    )
    .into()
}

// -- delete from TABLE where id=?

fn delete_by_id_sql(meta: &EntityMetadata) -> Arc<str> {
    format!(
        "delete from {} where {}=?",
        meta.table_name(),
        meta.id_mapping().column_name
    )
    .into()
}

// -- insert into TABLE (a,b,c) values (?,?,?)

fn insert_template(meta: &EntityMetadata) -> StatementTemplate {
    let insertable: Vec<&PropertyMapping> = meta
        .sorted_mappings()
        .into_iter()
        .filter(|m| m.insertable)
        .collect();

    let sql = if insertable.is_empty() {
        format!("insert into {} default values", meta.table_name())
    } else {
        let columns: Vec<&str> = insertable.iter().map(|m| m.column_name.as_str()).collect();
        format!(
            "insert into {} ({}) values ({})",
            meta.table_name(),
            columns.join(","),
            placeholders(insertable.len())
        )
    };

    StatementTemplate {
        sql: sql.into(),
        properties: insertable.iter().map(|m| m.property.clone()).collect(),
    }
}

// -- update TABLE set a=?,b=?,c=? where id=?

fn update_template(meta: &EntityMetadata) -> Option<StatementTemplate> {
    let updatable: Vec<&PropertyMapping> = meta
        .sorted_mappings()
        .into_iter()
        .filter(|m| !m.is_identifier && m.updatable)
        .collect();
    if updatable.is_empty() {
        return None;
    }
    Some(StatementTemplate {
        sql: update_sql(meta, &updatable).into(),
        properties: updatable.iter().map(|m| m.property.clone()).collect(),
    })
}

fn update_sql(meta: &EntityMetadata, mappings: &[&PropertyMapping]) -> String {
    let assignments: Vec<String> = mappings
        .iter()
        .map(|m| format!("{}=?", m.column_name))
        .collect();
    format!(
        "update {} set {} where {}=?",
        meta.table_name(),
        assignments.join(","),
        meta.id_mapping().column_name
    )
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

impl EntityMetadata {
    pub fn select_by_id_sql(&self) -> Arc<str> {
        Arc::clone(
            self.statements()
                .select_by_id
                .get_or_init(|| select_by_id_sql(self)),
        )
    }

    pub fn delete_by_id_sql(&self) -> Arc<str> {
        Arc::clone(
            self.statements()
                .delete_by_id
                .get_or_init(|| delete_by_id_sql(self)),
        )
    }

    pub fn insert_template(&self) -> &StatementTemplate {
        self.statements().insert.get_or_init(|| insert_template(self))
    }

    /// `None` when the entity has no updatable non-identifier property.
    pub fn update_template(&self) -> Option<&StatementTemplate> {
        self.statements()
            .update
            .get_or_init(|| update_template(self))
            .as_ref()
    }

    pub fn select_by_id(&self, id: Value) -> SqlOperation {
        SqlOperation::new(self.select_by_id_sql(), vec![id])
    }

    pub fn delete_by_id(&self, id: Value) -> SqlOperation {
        SqlOperation::new(self.delete_by_id_sql(), vec![id])
    }

    pub fn delete_entity<T: Entity>(&self, entity: &T) -> Result<SqlOperation, DbError> {
        Ok(self.delete_by_id(self.read_id(entity)?))
    }

    pub fn insert_entity<T: Entity>(&self, entity: &T) -> Result<SqlOperation, DbError> {
        let template = self.insert_template();
        let params = self.bind(entity, &template.properties)?;
        Ok(SqlOperation::new(Arc::clone(&template.sql), params))
    }

    pub fn update_entity<T: Entity>(&self, entity: &T) -> Result<SqlOperation, DbError> {
        let template = self.update_template().ok_or_else(|| DbError::NothingToUpdate {
            entity: self.type_path().to_string(),
        })?;
        let mut params = self.bind(entity, &template.properties)?;
        params.push(self.read_id(entity)?);
        Ok(SqlOperation::new(Arc::clone(&template.sql), params))
    }

    /// Update only the named properties, in the given order.
    pub fn update_properties<T: Entity>(
        &self,
        entity: &T,
        properties: &[&str],
    ) -> Result<SqlOperation, DbError> {
        if properties.is_empty() {
            return Err(DbError::EmptyPropertyList {
                entity: self.type_path().to_string(),
            });
        }
        let mut mappings = Vec::with_capacity(properties.len());
        for property in properties {
            let mapping = self.mapping(property).ok_or_else(|| DbError::UnknownProperty {
                entity: self.type_path().to_string(),
                property: property.to_string(),
            })?;
            if !mapping.updatable {
                return Err(DbError::NonUpdatableProperty {
                    entity: self.type_path().to_string(),
                    property: property.to_string(),
                });
            }
            mappings.push(mapping);
        }

        let mut params = Vec::with_capacity(mappings.len() + 1);
        for mapping in &mappings {
            params.push(self.read(entity, mapping)?);
        }
        params.push(self.read_id(entity)?);
        Ok(SqlOperation::new(update_sql(self, &mappings), params))
    }

    fn bind<T: Entity>(&self, entity: &T, properties: &[String]) -> Result<Vec<Value>, DbError> {
        properties
            .iter()
            .map(|property| {
                let mapping = self.mapping(property).ok_or_else(|| DbError::UnknownProperty {
                    entity: self.type_path().to_string(),
                    property: property.clone(),
                })?;
                self.read(entity, mapping)
            })
            .collect()
    }
}

fn row_lock() -> &'static Regex {
    static ROW_LOCK: OnceLock<Regex> = OnceLock::new();
    ROW_LOCK.get_or_init(|| {
        Regex::new(r"(?i)\s+for\s+update$").expect("row lock pattern is valid")
    })
}

/// Append the pagination clause to a select statement.
///
/// A trailing `for update` clause (any case or spacing) stays last.
pub fn build_limited_select(select: &str) -> String {
    let select = select.trim_end();
    let split = row_lock().find(select).map_or(select.len(), |m| m.start());
    let (head, lock) = select.split_at(split);
    let mut sql = String::with_capacity(select.len() + LIMIT_CLAUSE.len());
    sql.push_str(head);
    sql.push_str(LIMIT_CLAUSE);
    sql.push_str(lock);
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Accessor, ColumnOverride, EntityDescriptor, SqlEnum, ValueKind};
    use crate::error::ErrorClass;
    use crate::value::{FromValue, PropertyError};

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    enum Role {
        #[default]
        Member,
        Admin,
    }

    impl SqlEnum for Role {
        const SYMBOLS: &'static [&'static str] = &["Member", "Admin"];

        fn symbol(&self) -> &'static str {
            match self {
                Role::Member => "Member",
                Role::Admin => "Admin",
            }
        }

        fn from_symbol(symbol: &str) -> Option<Self> {
            match symbol {
                "Member" => Some(Role::Member),
                "Admin" => Some(Role::Admin),
                _ => None,
            }
        }
    }

    #[derive(Debug, Default)]
    struct Member {
        id: i64,
        name: String,
        passwd: String,
        role: Role,
        created: i64,
    }

    impl Entity for Member {
        const DESCRIPTOR: EntityDescriptor = EntityDescriptor::new(
            &[
                Accessor::new("id", ValueKind::INTEGER).id(),
                Accessor::new("name", ValueKind::TEXT),
                Accessor::new("passwd", ValueKind::TEXT).column(ColumnOverride::named("password")),
                Accessor::new("role", ValueKind::enumeration::<Role>()),
                Accessor::new("created", ValueKind::INTEGER)
                    .column(ColumnOverride::DEFAULT.updatable(false)),
            ],
            &["id", "name", "passwd", "role", "created"],
        );

        fn get(&self, property: &str) -> Option<Value> {
            match property {
                "id" => Some(self.id.into()),
                "name" => Some(self.name.as_str().into()),
                "passwd" => Some(self.passwd.as_str().into()),
                "role" => Some(self.role.to_value()),
                "created" => Some(self.created.into()),
                _ => None,
            }
        }

        fn set(&mut self, property: &str, value: Value) -> Result<(), PropertyError> {
            match property {
                "id" => self.id = FromValue::from_value(value)?,
                "name" => self.name = FromValue::from_value(value)?,
                "passwd" => self.passwd = FromValue::from_value(value)?,
                "role" => self.role = Role::from_value(value)?,
                "created" => self.created = FromValue::from_value(value)?,
                _ => return Err(PropertyError::UnknownProperty(property.to_string())),
            }
            Ok(())
        }
    }

    fn member() -> Member {
        Member {
            id: 7,
            name: "alice".into(),
            passwd: "secret".into(),
            role: Role::Admin,
            created: 100,
        }
    }

    #[test]
    fn select_and_delete_by_id() {
        let meta = EntityMetadata::of::<Member>().unwrap();
        let op = meta.select_by_id(Value::Integer(7));
        assert_eq!(&*op.sql, "select * from Member where id=?");
        assert_eq!(op.params, vec![Value::Integer(7)]);

        let op = meta.delete_entity(&member()).unwrap();
        assert_eq!(&*op.sql, "delete from Member where id=?");
        assert_eq!(op.params, vec![Value::Integer(7)]);
    }

    #[test]
    fn insert_uses_sorted_properties() {
        let meta = EntityMetadata::of::<Member>().unwrap();
        let op = meta.insert_entity(&member()).unwrap();
        assert_eq!(
            &*op.sql,
            "insert into Member (created,id,name,password,role) values (?,?,?,?,?)"
        );
        assert_eq!(
            op.params,
            vec![
                Value::Integer(100),
                Value::Integer(7),
                Value::Text("alice".into()),
                Value::Text("secret".into()),
                Value::Text("Admin".into()),
            ]
        );
    }

    #[test]
    fn update_skips_identifier_and_non_updatable() {
        let meta = EntityMetadata::of::<Member>().unwrap();
        let op = meta.update_entity(&member()).unwrap();
        assert_eq!(&*op.sql, "update Member set name=?,password=?,role=? where id=?");
        assert_eq!(op.params.last(), Some(&Value::Integer(7)));
        assert_eq!(op.params.len(), 4);
    }

    #[test]
    fn update_named_properties_keeps_caller_order() {
        let meta = EntityMetadata::of::<Member>().unwrap();
        let op = meta.update_properties(&member(), &["role", "name"]).unwrap();
        assert_eq!(&*op.sql, "update Member set role=?,name=? where id=?");
        assert_eq!(
            op.params,
            vec![
                Value::Text("Admin".into()),
                Value::Text("alice".into()),
                Value::Integer(7)
            ]
        );
    }

    #[test]
    fn update_named_properties_rejects_bad_input() {
        let meta = EntityMetadata::of::<Member>().unwrap();
        let err = meta.update_properties(&member(), &[]).unwrap_err();
        assert!(matches!(err, DbError::EmptyPropertyList { .. }));

        let err = meta.update_properties(&member(), &["created"]).unwrap_err();
        assert!(matches!(
            err,
            DbError::NonUpdatableProperty { ref property, .. } if property == "created"
        ));
        assert_eq!(err.class(), ErrorClass::Resolution);

        let err = meta.update_properties(&member(), &["nickname"]).unwrap_err();
        assert!(matches!(err, DbError::UnknownProperty { .. }));
    }

    #[test]
    fn templates_are_memoized() {
        let meta = EntityMetadata::of::<Member>().unwrap();
        let first = meta.insert_template() as *const StatementTemplate;
        let second = meta.insert_template() as *const StatementTemplate;
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&meta.select_by_id_sql(), &meta.select_by_id_sql()));
    }

    #[test]
    fn concurrent_first_use_yields_identical_text() {
        let meta = EntityMetadata::of::<Member>().unwrap();
        let reference = EntityMetadata::of::<Member>().unwrap();
        let expected = reference.update_template().cloned();

        let results: Vec<Option<StatementTemplate>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| meta.update_template().cloned()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for result in results {
            assert_eq!(result, expected);
        }
    }

    #[test]
    fn entity_without_updatable_columns() {
        #[derive(Default)]
        struct Tag {
            id: i64,
        }

        impl Entity for Tag {
            const DESCRIPTOR: EntityDescriptor =
                EntityDescriptor::new(&[Accessor::new("id", ValueKind::INTEGER).id()], &["id"]);

            fn get(&self, property: &str) -> Option<Value> {
                (property == "id").then(|| self.id.into())
            }

            fn set(&mut self, property: &str, value: Value) -> Result<(), PropertyError> {
                match property {
                    "id" => self.id = FromValue::from_value(value)?,
                    _ => return Err(PropertyError::UnknownProperty(property.to_string())),
                }
                Ok(())
            }
        }

        let meta = EntityMetadata::of::<Tag>().unwrap();
        let err = meta.update_entity(&Tag { id: 1 }).unwrap_err();
        assert!(matches!(err, DbError::NothingToUpdate { .. }));
        assert_eq!(
            &*meta.insert_entity(&Tag { id: 1 }).unwrap().sql,
            "insert into Tag (id) values (?)"
        );
    }

    #[test]
    fn limited_select_appends_pagination() {
        assert_eq!(
            build_limited_select("select * from User where id>=?"),
            "select * from User where id>=? limit ?,?"
        );
    }

    #[test]
    fn limited_select_keeps_row_lock_last() {
        assert_eq!(
            build_limited_select("select * from User where id>=? FOR UPDATE"),
            "select * from User where id>=? limit ?,? FOR UPDATE"
        );
    }

    #[test]
    fn limited_select_finds_row_lock_after_any_whitespace() {
        assert_eq!(
            build_limited_select("select * from Post\nfor  update\n"),
            "select * from Post limit ?,?\nfor  update"
        );
        assert_eq!(
            build_limited_select("select * from Post where note='before update'"),
            "select * from Post where note='before update' limit ?,?"
        );
    }
}
