//! Resolved import values handed to activators.

use std::any::{Any, type_name};
use std::sync::Arc;

use partsmith_common::error::{CompositionError, Result};
use partsmith_common::types::{Cardinality, PartId};

use crate::activator::Instance;
use crate::factory::ExportFactory;

/// One resolved satisfier of an import.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// An instance produced by the satisfying part.
    Value {
        /// The part that produced the instance.
        part: PartId,
        /// The instance itself.
        instance: Instance,
    },
    /// A factory opening a boundary scope for the satisfying part.
    Factory(ExportFactory),
}

/// Every resolved satisfier of one import.
#[derive(Debug, Clone)]
pub struct ImportValue {
    name: String,
    cardinality: Cardinality,
    items: Vec<Resolved>,
}

impl ImportValue {
    /// Creates a resolved import.
    #[must_use]
    pub const fn new(name: String, cardinality: Cardinality, items: Vec<Resolved>) -> Self {
        Self {
            name,
            cardinality,
            items,
        }
    }

    /// Returns the import name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared cardinality.
    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Returns the resolved satisfiers in binding order.
    #[must_use]
    pub fn items(&self) -> &[Resolved] {
        &self.items
    }

    /// Returns the number of satisfiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether nothing satisfied the import.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the single instance satisfying the import.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::ImportShape`] unless exactly one plain
    /// value is present, or [`CompositionError::TypeMismatch`] if it is
    /// not a `T`.
    pub fn instance<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        match self.items.as_slice() {
            [item] => self.downcast_item(item),
            items => Err(self.shape(format!("expected exactly one value, found {}", items.len()))),
        }
    }

    /// Returns the instance satisfying the import, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::ImportShape`] if more than one value
    /// is present or the value is a factory.
    pub fn optional<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>> {
        match self.items.as_slice() {
            [] => Ok(None),
            [item] => self.downcast_item(item).map(Some),
            items => Err(self.shape(format!("expected at most one value, found {}", items.len()))),
        }
    }

    /// Returns every instance satisfying the import.
    ///
    /// # Errors
    ///
    /// Returns an error if any satisfier is a factory or not a `T`.
    pub fn instances<T: Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>> {
        self.items
            .iter()
            .map(|item| self.downcast_item(item))
            .collect()
    }

    /// Returns the single boundary factory satisfying the import.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::ImportShape`] unless exactly one
    /// factory is present.
    pub fn factory(&self) -> Result<ExportFactory> {
        match self.items.as_slice() {
            [Resolved::Factory(factory)] => Ok(factory.clone()),
            [Resolved::Value { .. }] => Err(self.shape("expected a boundary factory, found a value")),
            items => Err(self.shape(format!("expected exactly one factory, found {}", items.len()))),
        }
    }

    /// Returns every boundary factory satisfying the import.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::ImportShape`] if any satisfier is a
    /// plain value.
    pub fn factories(&self) -> Result<Vec<ExportFactory>> {
        self.items
            .iter()
            .map(|item| match item {
                Resolved::Factory(factory) => Ok(factory.clone()),
                Resolved::Value { .. } => Err(self.shape("expected boundary factories, found a value")),
            })
            .collect()
    }

    fn downcast_item<T: Any + Send + Sync>(&self, item: &Resolved) -> Result<Arc<T>> {
        match item {
            Resolved::Value { part, instance } => downcast(part, instance),
            Resolved::Factory(_) => Err(self.shape("is bound through a boundary, use factory()")),
        }
    }

    fn shape(&self, message: impl Into<String>) -> CompositionError {
        CompositionError::ImportShape {
            import: self.name.clone(),
            message: message.into(),
        }
    }
}

/// The construction-time imports of a part, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ImportValues {
    values: Vec<ImportValue>,
}

impl ImportValues {
    /// Wraps resolved imports.
    #[must_use]
    pub const fn new(values: Vec<ImportValue>) -> Self {
        Self { values }
    }

    /// Returns the import named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::NotFound`] if the part declares no
    /// construction import with that name.
    pub fn get(&self, name: &str) -> Result<&ImportValue> {
        self.values
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| CompositionError::NotFound {
                kind: "import",
                id: name.to_owned(),
            })
    }

    /// Shorthand for `get(name)?.instance::<T>()`.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get) and [`ImportValue::instance`].
    pub fn instance<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.get(name)?.instance()
    }

    /// Iterates over the imports in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ImportValue> {
        self.values.iter()
    }

    /// Returns the number of imports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the part has no construction imports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Downcasts an instance produced by `part`.
///
/// # Errors
///
/// Returns [`CompositionError::TypeMismatch`] if the instance is not a `T`.
pub fn downcast<T: Any + Send + Sync>(part: &PartId, instance: &Instance) -> Result<Arc<T>> {
    Arc::clone(instance)
        .downcast::<T>()
        .map_err(|_| CompositionError::TypeMismatch {
            part: part.clone(),
            expected: type_name::<T>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(part: &str, instance: Instance) -> Resolved {
        Resolved::Value {
            part: PartId::new(part),
            instance,
        }
    }

    #[test]
    fn instance_requires_exactly_one_value() {
        let one = ImportValue::new(
            "port".into(),
            Cardinality::ExactlyOne,
            vec![value("config", Arc::new(8080_u16))],
        );
        assert_eq!(*one.instance::<u16>().expect("one value"), 8080);

        let none = ImportValue::new("port".into(), Cardinality::ExactlyOne, Vec::new());
        let err = none.instance::<u16>().unwrap_err();
        assert!(matches!(err, CompositionError::ImportShape { .. }), "got: {err}");
    }

    #[test]
    fn wrong_type_reports_producing_part() {
        let value = ImportValue::new(
            "port".into(),
            Cardinality::ExactlyOne,
            vec![value("config", Arc::new("8080"))],
        );
        let err = value.instance::<u16>().unwrap_err();
        assert!(
            matches!(&err, CompositionError::TypeMismatch { part, .. } if part.as_str() == "config"),
            "got: {err}"
        );
    }

    #[test]
    fn optional_and_many() {
        let empty = ImportValue::new("x".into(), Cardinality::OneOrZero, Vec::new());
        assert!(empty.optional::<u8>().expect("empty is fine").is_none());
        assert!(empty.instances::<u8>().expect("empty is fine").is_empty());

        let many = ImportValue::new(
            "x".into(),
            Cardinality::ZeroOrMore,
            vec![value("a", Arc::new(1_u8)), value("b", Arc::new(2_u8))],
        );
        let all: Vec<u8> = many.instances::<u8>().expect("all").iter().map(|v| **v).collect();
        assert_eq!(all, vec![1, 2]);
        assert!(many.optional::<u8>().is_err());
    }

    #[test]
    fn values_look_up_by_name() {
        let values = ImportValues::new(vec![ImportValue::new(
            "name".into(),
            Cardinality::ExactlyOne,
            vec![value("n", Arc::new(String::from("svc")))],
        )]);
        assert_eq!(values.instance::<String>("name").expect("present").as_str(), "svc");
        let err = values.get("missing").unwrap_err();
        assert!(matches!(err, CompositionError::NotFound { kind: "import", .. }));
    }

    #[test]
    fn factory_on_plain_value_is_rejected() {
        let value = ImportValue::new(
            "factory".into(),
            Cardinality::ExactlyOne,
            vec![value("a", Arc::new(1_u8))],
        );
        assert!(matches!(
            value.factory().unwrap_err(),
            CompositionError::ImportShape { .. }
        ));
    }
}
