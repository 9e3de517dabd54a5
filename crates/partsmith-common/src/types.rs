//! Domain primitive types used across the Partsmith workspace.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a part within a catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartId(String);

impl PartId {
    /// Creates a new part ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PartId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PartId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Unique identifier for a runtime scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(String);

impl ScopeId {
    /// Generates a random scope ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a capability: a contract name plus metadata constraints.
///
/// Equality and hashing are structural over both the name and the
/// constraints, so two contracts with the same name but different
/// constraints never match each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractIdentity {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    constraints: BTreeMap<String, String>,
}

impl ContractIdentity {
    /// Creates an unconstrained contract with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: BTreeMap::new(),
        }
    }

    /// Creates a contract named after the Rust type `T`.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self::new(std::any::type_name::<T>())
    }

    /// Adds a constraint that becomes part of the contract's identity.
    #[must_use]
    pub fn with_constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.constraints.insert(key.into(), value.into());
        self
    }

    /// Returns the contract name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the constraints, ordered by key.
    #[must_use]
    pub const fn constraints(&self) -> &BTreeMap<String, String> {
        &self.constraints
    }
}

impl fmt::Display for ContractIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.constraints.is_empty() {
            let pairs: Vec<String> = self
                .constraints
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, " [{}]", pairs.join(", "))?;
        }
        Ok(())
    }
}

impl From<&str> for ContractIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Shape of a type as seen by the type-compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// A non-generic type.
    Named(String),
    /// A generic type with all of its arguments bound.
    Generic {
        /// Generic definition name.
        name: String,
        /// Bound type arguments.
        args: Vec<TypeRef>,
    },
    /// An unbound generic definition (`Repository<_>`).
    OpenGeneric {
        /// Generic definition name.
        name: String,
        /// Number of type parameters.
        arity: usize,
    },
}

impl TypeRef {
    /// A non-generic type with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// A closed generic type.
    #[must_use]
    pub fn generic(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Generic {
            name: name.into(),
            args,
        }
    }

    /// An open generic definition with `arity` unbound parameters.
    #[must_use]
    pub fn open(name: impl Into<String>, arity: usize) -> Self {
        Self::OpenGeneric {
            name: name.into(),
            arity,
        }
    }

    /// The type shape of the Rust type `T`, treated as non-generic.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self::named(std::any::type_name::<T>())
    }

    /// Returns the definition name and arity of this type.
    #[must_use]
    pub fn shape(&self) -> (&str, usize) {
        match self {
            Self::Named(name) => (name, 0),
            Self::Generic { name, args } => (name, args.len()),
            Self::OpenGeneric { name, arity } => (name, *arity),
        }
    }

    /// Returns whether this type is generic, open or closed.
    #[must_use]
    pub const fn is_generic(&self) -> bool {
        matches!(self, Self::Generic { .. } | Self::OpenGeneric { .. })
    }

    /// Returns whether this is an unbound generic definition.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::OpenGeneric { .. })
    }

    /// Returns whether a value of type `self` can satisfy an import
    /// expecting `expected`.
    ///
    /// When either side is an open generic definition and the other is
    /// generic, only the shapes are compared; otherwise the types must be
    /// structurally equal.
    #[must_use]
    pub fn is_assignable_to(&self, expected: &Self) -> bool {
        if (self.is_open() && expected.is_generic()) || (expected.is_open() && self.is_generic()) {
            return self.shape() == expected.shape();
        }
        self == expected
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Generic { name, args } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{name}<{}>", args.join(", "))
            }
            Self::OpenGeneric { name, arity } => {
                write!(f, "{name}<{}>", vec!["_"; *arity].join(", "))
            }
        }
    }
}

/// How many satisfying exports an import tolerates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// Exactly one export must satisfy the import.
    #[default]
    ExactlyOne,
    /// Zero or one export may satisfy the import.
    OneOrZero,
    /// Any number of exports may satisfy the import.
    ZeroOrMore,
}

impl Cardinality {
    /// Returns whether `count` satisfying exports are acceptable.
    #[must_use]
    pub const fn accepts(self, count: usize) -> bool {
        match self {
            Self::ExactlyOne => count == 1,
            Self::OneOrZero => count <= 1,
            Self::ZeroOrMore => true,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactlyOne => write!(f, "exactly one"),
            Self::OneOrZero => write!(f, "one or zero"),
            Self::ZeroOrMore => write!(f, "zero or more"),
        }
    }
}

/// When an import must be satisfied relative to its owner's creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportKind {
    /// Resolved before the owning part is constructed.
    #[default]
    Construction,
    /// Applied to the instance after it has been constructed.
    Settable,
}

/// Instance lifetime policy of a part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sharing {
    /// A fresh instance is created for every request.
    #[default]
    NonShared,
    /// One instance per scope; `None` shares at the root.
    Shared {
        /// Name of the sharing boundary the part belongs to.
        boundary: Option<String>,
    },
}

impl Sharing {
    /// Returns whether instances of the part are cached.
    #[must_use]
    pub const fn is_shared(&self) -> bool {
        matches!(self, Self::Shared { .. })
    }

    /// Returns the boundary name for shared parts, if any.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        match self {
            Self::Shared { boundary } => boundary.as_deref(),
            Self::NonShared => None,
        }
    }
}

impl fmt::Display for Sharing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonShared => write!(f, "non-shared"),
            Self::Shared { boundary: None } => write!(f, "shared"),
            Self::Shared {
                boundary: Some(name),
            } => write!(f, "shared within {name}"),
        }
    }
}
