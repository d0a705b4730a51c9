use crate::value::PropertyError;
use thiserror::Error;

///
/// ErrorClass
///
/// Coarse failure kind, for callers that only need to know how to react.
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Invalid entity declarations; fatal at registry build time.
    Configuration,
    /// A call referenced something the registry cannot resolve.
    Resolution,
    /// Row count did not match what the call requires.
    Cardinality,
    /// A decoded column could not be assigned.
    Materialization,
    /// The execution layer failed.
    Execution,
}

/// Errors raised by the mapping engine and the facade.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("entity '{entity}' declares no identifier property")]
    MissingIdentifier { entity: String },

    #[error("entity '{entity}' declares more than one identifier: '{first}' and '{second}'")]
    DuplicateIdentifier {
        entity: String,
        first: String,
        second: String,
    },

    #[error("entity '{entity}' has accessor '{property}' without a matching mutator")]
    MissingMutator { entity: String, property: String },

    #[error("column '{column}' of '{entity}' is mapped by both '{first}' and '{second}'")]
    DuplicateColumn {
        entity: String,
        column: String,
        first: String,
        second: String,
    },

    #[error("table '{table}' is mapped by both '{first}' and '{second}'")]
    DuplicateTable {
        table: String,
        first: String,
        second: String,
    },

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("SQL grammar error: {sql}")]
    SqlGrammar { sql: String },

    #[error("table '{table}' maps to '{actual}', not '{expected}'")]
    EntityTypeMismatch {
        table: String,
        expected: String,
        actual: String,
    },

    #[error("entity '{entity}' has no mapped property '{property}'")]
    UnknownProperty { entity: String, property: String },

    #[error("could not update property '{property}' of '{entity}' because it is not updatable")]
    NonUpdatableProperty { entity: String, property: String },

    #[error("update of '{entity}' requires at least one property")]
    EmptyPropertyList { entity: String },

    #[error("entity '{entity}' has no updatable properties")]
    NothingToUpdate { entity: String },

    #[error("'{symbol}' is not a constant of property '{property}' on '{entity}'")]
    InvalidEnumSymbol {
        entity: String,
        property: String,
        symbol: String,
    },

    #[error("empty results: {sql}")]
    EmptyResult { sql: String },

    #[error("non-unique results ({rows} rows): {sql}")]
    NonUniqueResult { sql: String, rows: usize },

    #[error("failed to map column '{column}' onto '{entity}'")]
    Materialize {
        entity: String,
        column: String,
        #[source]
        source: PropertyError,
    },

    #[error("cannot convert {found} result of '{sql}' to {target}")]
    ValueConversion {
        sql: String,
        target: &'static str,
        found: &'static str,
    },

    #[error("database connection poisoned")]
    ConnectionPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::MissingIdentifier { .. }
            | Self::DuplicateIdentifier { .. }
            | Self::MissingMutator { .. }
            | Self::DuplicateColumn { .. }
            | Self::DuplicateTable { .. } => ErrorClass::Configuration,

            Self::UnknownEntity(_)
            | Self::UnknownTable(_)
            | Self::SqlGrammar { .. }
            | Self::EntityTypeMismatch { .. }
            | Self::UnknownProperty { .. }
            | Self::NonUpdatableProperty { .. }
            | Self::EmptyPropertyList { .. }
            | Self::NothingToUpdate { .. }
            | Self::InvalidEnumSymbol { .. } => ErrorClass::Resolution,

            Self::EmptyResult { .. } | Self::NonUniqueResult { .. } => ErrorClass::Cardinality,

            Self::Materialize { .. } | Self::ValueConversion { .. } => {
                ErrorClass::Materialization
            }

            Self::ConnectionPoisoned | Self::Sqlite(_) => ErrorClass::Execution,
        }
    }
}
