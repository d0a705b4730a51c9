//! Declared persistence metadata for entity types.
//!
//! An entity type describes itself through a constant [`EntityDescriptor`]: the
//! accessors it exposes, the markers on each accessor, and the mutators it accepts.
//! [`crate::EntityMetadata`] is derived from this descriptor once per type.

use crate::value::{PropertyError, Value};

/// A record type persisted as rows of one table.
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct User { id: i64, name: String }
///
/// impl Entity for User {
///     const DESCRIPTOR: EntityDescriptor = EntityDescriptor::new(
///         &[
///             Accessor::new("id", ValueKind::INTEGER).id(),
///             Accessor::new("name", ValueKind::TEXT),
///         ],
///         &["id", "name"],
///     );
///
///     fn get(&self, property: &str) -> Option<Value> {
///         match property {
///             "id" => Some(self.id.into()),
///             "name" => Some(self.name.as_str().into()),
///             _ => None,
///         }
///     }
///
///     fn set(&mut self, property: &str, value: Value) -> Result<(), PropertyError> {
///         match property {
///             "id" => self.id = FromValue::from_value(value)?,
///             "name" => self.name = FromValue::from_value(value)?,
///             _ => return Err(PropertyError::UnknownProperty(property.to_string())),
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Entity: Default + 'static {
    const DESCRIPTOR: EntityDescriptor;

    /// Read a property. `None` means the type has no such accessor.
    fn get(&self, property: &str) -> Option<Value>;

    /// Assign a property from a decoded value.
    fn set(&mut self, property: &str, value: Value) -> Result<(), PropertyError>;
}

/// Static description of an entity type.
#[derive(Debug, Clone, Copy)]
pub struct EntityDescriptor {
    /// Explicit table name; the type's simple name is used when absent.
    pub table: Option<&'static str>,
    pub accessors: &'static [Accessor],
    pub mutators: &'static [&'static str],
}

impl EntityDescriptor {
    pub const fn new(accessors: &'static [Accessor], mutators: &'static [&'static str]) -> Self {
        Self {
            table: None,
            accessors,
            mutators,
        }
    }

    /// Override the table name.
    pub const fn table(mut self, name: &'static str) -> Self {
        self.table = Some(name);
        self
    }
}

/// One readable property and the markers attached to it.
#[derive(Debug, Clone, Copy)]
pub struct Accessor {
    pub property: &'static str,
    pub kind: ValueKind,
    pub id: bool,
    pub version: bool,
    pub transient: bool,
    pub column: Option<ColumnOverride>,
}

impl Accessor {
    pub const fn new(property: &'static str, kind: ValueKind) -> Self {
        Self {
            property,
            kind,
            id: false,
            version: false,
            transient: false,
            column: None,
        }
    }

    /// Mark as the identifying property.
    pub const fn id(mut self) -> Self {
        self.id = true;
        self
    }

    /// Mark as the optimistic-concurrency counter.
    pub const fn version(mut self) -> Self {
        self.version = true;
        self
    }

    /// Exclude from all mapping.
    pub const fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub const fn column(mut self, column: ColumnOverride) -> Self {
        self.column = Some(column);
        self
    }
}

/// Explicit column settings for one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnOverride {
    pub name: Option<&'static str>,
    pub insertable: bool,
    pub updatable: bool,
    /// Declared width; carried as metadata only.
    pub length: Option<u32>,
}

impl ColumnOverride {
    pub const DEFAULT: Self = Self {
        name: None,
        insertable: true,
        updatable: true,
        length: None,
    };

    pub const fn named(name: &'static str) -> Self {
        Self {
            name: Some(name),
            ..Self::DEFAULT
        }
    }

    pub const fn insertable(mut self, insertable: bool) -> Self {
        self.insertable = insertable;
        self
    }

    pub const fn updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    pub const fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }
}

impl Default for ColumnOverride {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How a property's values are encoded in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar(ScalarKind),
    /// Stored as the constant's symbolic name.
    Enum(&'static [&'static str]),
}

impl ValueKind {
    pub const BOOLEAN: Self = Self::Scalar(ScalarKind::Boolean);
    pub const INTEGER: Self = Self::Scalar(ScalarKind::Integer);
    pub const REAL: Self = Self::Scalar(ScalarKind::Real);
    pub const TEXT: Self = Self::Scalar(ScalarKind::Text);
    pub const BLOB: Self = Self::Scalar(ScalarKind::Blob);

    pub const fn enumeration<E: SqlEnum>() -> Self {
        Self::Enum(E::SYMBOLS)
    }

    pub const fn is_enum(&self) -> bool {
        matches!(self, Self::Enum(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Boolean,
    Integer,
    Real,
    Text,
    Blob,
}

/// A fieldless enum persisted by the name of its constants.
pub trait SqlEnum: Sized + Copy + 'static {
    const SYMBOLS: &'static [&'static str];

    fn symbol(&self) -> &'static str;

    fn from_symbol(symbol: &str) -> Option<Self>;

    /// Decode a mutator argument.
    fn from_value(value: Value) -> Result<Self, PropertyError> {
        match value {
            Value::Text(symbol) => Self::from_symbol(&symbol).ok_or(PropertyError::UnknownSymbol {
                symbol,
                target: std::any::type_name::<Self>(),
            }),
            other => Err(PropertyError::TypeMismatch {
                expected: "text",
                found: other.type_name(),
            }),
        }
    }

    /// Encode for an accessor.
    fn to_value(&self) -> Value {
        Value::Text(self.symbol().to_string())
    }
}

/// Last path segment of a type name, generics stripped.
pub(crate) fn simple_name(type_path: &'static str) -> &'static str {
    let base = type_path.split('<').next().unwrap_or(type_path);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Color {
        Red,
        Green,
    }

    impl SqlEnum for Color {
        const SYMBOLS: &'static [&'static str] = &["Red", "Green"];

        fn symbol(&self) -> &'static str {
            match self {
                Color::Red => "Red",
                Color::Green => "Green",
            }
        }

        fn from_symbol(symbol: &str) -> Option<Self> {
            match symbol {
                "Red" => Some(Color::Red),
                "Green" => Some(Color::Green),
                _ => None,
            }
        }
    }

    #[test]
    fn simple_name_strips_path_and_generics() {
        assert_eq!(simple_name("app::model::User"), "User");
        assert_eq!(simple_name("User"), "User");
        assert_eq!(simple_name("app::Wrapper<app::Inner>"), "Wrapper");
    }

    #[test]
    fn enum_kind_carries_symbols() {
        assert_eq!(ValueKind::enumeration::<Color>(), ValueKind::Enum(&["Red", "Green"]));
        assert!(ValueKind::enumeration::<Color>().is_enum());
    }

    #[test]
    fn enum_decoding_rejects_unknown_symbol() {
        assert_eq!(Color::from_value(Value::Text("Green".into())), Ok(Color::Green));
        assert!(matches!(
            Color::from_value(Value::Text("Blue".into())),
            Err(PropertyError::UnknownSymbol { .. })
        ));
        assert_eq!(Color::Red.to_value(), Value::Text("Red".into()));
    }

    #[test]
    fn column_override_builders() {
        const ID: ColumnOverride = ColumnOverride::DEFAULT.updatable(false).length(32);
        assert!(ID.insertable);
        assert!(!ID.updatable);
        assert_eq!(ID.length, Some(32));
        assert_eq!(ColumnOverride::named("css").name, Some("css"));
    }
}
