//! Metadata-driven entity persistence over SQLite.
//!
//! # Intention
//!
//! - Describe entity types once and derive their table mapping from that description.
//! - Generate the CRUD statements for each entity and cache them per type.
//! - Materialize query rows back into entities by matching column labels.
//! - Discover entity types from linked code, descriptor directories and archives.
//!
//! # Architectural Boundaries
//!
//! - Statement execution sits behind [`SqlExecutor`]; the mapping engine never
//!   touches a connection directly.
//! - No schema management, no relationships between entities, no transactions.

pub mod catalog;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod metadata;
pub mod registry;
pub mod row;
pub mod sqlite;
pub mod statement;
pub mod value;

pub use catalog::{TypeCatalog, TypeDescriptor, TypeLoader};
pub use config::{DbConfig, SourceConfig};
pub use db::Db;
pub use entity::{
    Accessor, ColumnOverride, Entity, EntityDescriptor, ScalarKind, SqlEnum, ValueKind,
};
pub use error::{DbError, ErrorClass};
pub use metadata::{EntityMetadata, PropertyMapping};
pub use registry::Registry;
pub use row::{Row, RowMaterializer};
pub use sqlite::{SqlExecutor, SqliteExecutor};
pub use statement::{build_limited_select, SqlOperation, StatementTemplate};
pub use value::{FromValue, PropertyError, Value};

#[doc(hidden)]
pub mod __reexports {
    pub use ctor;
}
