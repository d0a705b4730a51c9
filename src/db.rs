//! The public CRUD and query surface.

use std::any::TypeId;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use regex::Regex;
use tracing::{debug, info};

use crate::config::DbConfig;
use crate::entity::Entity;
use crate::error::DbError;
use crate::metadata::EntityMetadata;
use crate::registry::Registry;
use crate::row::RowMaterializer;
use crate::sqlite::{SqlExecutor, SqliteExecutor};
use crate::statement::{build_limited_select, SqlOperation};
use crate::value::{FromValue, Value};

fn select_from() -> &'static Regex {
    static SELECT_FROM: OnceLock<Regex> = OnceLock::new();
    SELECT_FROM.get_or_init(|| {
        Regex::new(r"(?is)^\s*select\s+.+?\s+from\s+(\w+)").expect("select pattern is valid")
    })
}

/// Table named by the first `from` of a `select ... from <table> ...` statement.
pub fn select_table(sql: &str) -> Option<&str> {
    select_from()
        .captures(sql)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

///
/// Db
///
/// Entity persistence over an execution collaborator.
///

pub struct Db<X = SqliteExecutor> {
    registry: Registry,
    executor: X,
}

impl Db<SqliteExecutor> {
    /// Discover entities, build the registry and open the configured database.
    pub fn open(config: &DbConfig) -> anyhow::Result<Self> {
        info!(database = %config.database, namespace = %config.namespace, "init db");
        let registry = Registry::from_catalog(&config.catalog())
            .context("cannot build entity registry")?;
        let executor = if config.is_in_memory() {
            SqliteExecutor::open_in_memory()
        } else {
            SqliteExecutor::open(&config.database)
        }
        .with_context(|| format!("cannot open database {}", config.database))?;
        Ok(Self::new(registry, executor))
    }
}

impl<X: SqlExecutor> Db<X> {
    pub fn new(registry: Registry, executor: X) -> Self {
        Self { registry, executor }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    /// Execute any update statement; returns the number of affected rows.
    pub fn execute_update(&self, sql: &str, params: &[Value]) -> Result<usize, DbError> {
        debug!(sql, "execute update");
        self.executor.execute(sql, params)
    }

    /// Insert an entity, writing all insertable properties.
    pub fn create<T: Entity>(&self, entity: &T) -> Result<(), DbError> {
        let op = self.registry.metadata::<T>()?.insert_entity(entity)?;
        self.run(&op).map(|_| ())
    }

    /// Load an entity by id; `None` when no row matches.
    pub fn get_by_id<T: Entity>(&self, id: impl Into<Value>) -> Result<Option<T>, DbError> {
        let meta = self.registry.metadata::<T>()?;
        let op = meta.select_by_id(id.into());
        debug!(sql = &*op.sql, "get by id");
        let mut list = self.fetch::<T>(meta, &op.sql, &op.params)?;
        match list.len() {
            0 => Ok(None),
            1 => Ok(list.pop()),
            rows => Err(DbError::NonUniqueResult {
                sql: op.sql.to_string(),
                rows,
            }),
        }
    }

    /// Update all updatable properties.
    pub fn update_entity<T: Entity>(&self, entity: &T) -> Result<usize, DbError> {
        let op = self.registry.metadata::<T>()?.update_entity(entity)?;
        self.run(&op)
    }

    /// Update only the named properties.
    pub fn update_properties<T: Entity>(
        &self,
        entity: &T,
        properties: &[&str],
    ) -> Result<usize, DbError> {
        let op = self
            .registry
            .metadata::<T>()?
            .update_properties(entity, properties)?;
        self.run(&op)
    }

    /// Delete the row with the entity's id.
    pub fn delete_entity<T: Entity>(&self, entity: &T) -> Result<usize, DbError> {
        let op = self.registry.metadata::<T>()?.delete_entity(entity)?;
        self.run(&op)
    }

    pub fn delete_by_id<T: Entity>(&self, id: impl Into<Value>) -> Result<usize, DbError> {
        let op = self.registry.metadata::<T>()?.delete_by_id(id.into());
        self.run(&op)
    }

    /// Query rows of the table named in `sql`, materialized as `T`.
    ///
    /// ```ignore
    /// let users: Vec<User> = db.query_for_list("select * from User where age>?", &values![20])?;
    /// ```
    pub fn query_for_list<T: Entity>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>, DbError> {
        debug!(sql, "query for list");
        let meta = self.resolve_select::<T>(sql)?;
        self.fetch(meta, sql, params)
    }

    /// Like [`Db::query_for_list`], returning at most `max` rows starting at `first`.
    pub fn query_for_limited_list<T: Entity>(
        &self,
        sql: &str,
        first: u32,
        max: u32,
        params: &[Value],
    ) -> Result<Vec<T>, DbError> {
        debug!(sql, first, max, "query for limited list");
        let mut paged = Vec::with_capacity(params.len() + 2);
        paged.extend_from_slice(params);
        paged.push(Value::from(first));
        paged.push(Value::from(max));
        self.query_for_list(&build_limited_select(sql), &paged)
    }

    /// Exactly one entity.
    pub fn query_for_object<T: Entity>(&self, sql: &str, params: &[Value]) -> Result<T, DbError> {
        debug!(sql, "query for object");
        let list = self.query_for_list(sql, params)?;
        exactly_one(sql, list)
    }

    /// Exactly one row; its first column as `i64`.
    pub fn query_for_long(&self, sql: &str, params: &[Value]) -> Result<i64, DbError> {
        debug!(sql, "query for long");
        let list = self.executor.query(sql, params, |row| {
            Ok(row.get(0).cloned().unwrap_or(Value::Null))
        })?;
        let value = exactly_one(sql, list)?;
        let found = value.type_name();
        i64::from_value(value).map_err(|_| DbError::ValueConversion {
            sql: sql.to_string(),
            target: "i64",
            found,
        })
    }

    /// Exactly one row; its first column as `i32`.
    pub fn query_for_int(&self, sql: &str, params: &[Value]) -> Result<i32, DbError> {
        let wide = self.query_for_long(sql, params)?;
        i32::try_from(wide).map_err(|_| DbError::ValueConversion {
            sql: sql.to_string(),
            target: "i32",
            found: "integer",
        })
    }

    fn run(&self, op: &SqlOperation) -> Result<usize, DbError> {
        debug!(sql = &*op.sql, params = op.params.len(), "execute");
        self.executor.execute(&op.sql, &op.params)
    }

    fn fetch<T: Entity>(
        &self,
        meta: &EntityMetadata,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>, DbError> {
        let materializer = RowMaterializer::<T>::new(meta);
        self.executor
            .query(sql, params, |row| materializer.materialize(row))
    }

    fn resolve_select<T: Entity>(&self, sql: &str) -> Result<&Arc<EntityMetadata>, DbError> {
        let table = select_table(sql).ok_or_else(|| DbError::SqlGrammar {
            sql: sql.to_string(),
        })?;
        let meta = self.registry.table(table)?;
        if meta.type_id() != TypeId::of::<T>() {
            return Err(DbError::EntityTypeMismatch {
                table: table.to_string(),
                expected: std::any::type_name::<T>().to_string(),
                actual: meta.type_path().to_string(),
            });
        }
        Ok(meta)
    }
}

fn exactly_one<T>(sql: &str, mut list: Vec<T>) -> Result<T, DbError> {
    match list.len() {
        0 => Err(DbError::EmptyResult {
            sql: sql.to_string(),
        }),
        1 => Ok(list.remove(0)),
        rows => Err(DbError::NonUniqueResult {
            sql: sql.to_string(),
            rows,
        }),
    }
}
