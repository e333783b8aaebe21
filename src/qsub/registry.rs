//! Ordered registry of submission fields

use super::fields::{FieldCategory, QsubField};

/// The fixed, ordered set of fields the assembler walks
///
/// Order matters only for the command: eligibility is a logical AND over all
/// fields, while fragments are emitted in registry order.
#[derive(Default)]
pub struct FieldRegistry {
    fields: Vec<Box<dyn QsubField>>,
}

impl FieldRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Registry with the MetaCentrum field set
    pub fn standard() -> Self {
        super::standard::standard_fields()
            .into_iter()
            .fold(FieldRegistryBuilder::new(), |builder, field| {
                builder.boxed(field)
            })
            .build()
    }

    pub fn builder() -> FieldRegistryBuilder {
        FieldRegistryBuilder::new()
    }

    /// All fields in registry order
    pub fn fields(&self) -> impl Iterator<Item = &dyn QsubField> {
        self.fields.iter().map(|f| -> &dyn QsubField { f.as_ref() })
    }

    /// Get a field by name
    pub fn get(&self, name: &str) -> Option<&dyn QsubField> {
        self.fields().find(|f| f.name() == name)
    }

    pub fn basic_fields(&self) -> Vec<&dyn QsubField> {
        self.by_category(FieldCategory::Basic)
    }

    pub fn advanced_fields(&self) -> Vec<&dyn QsubField> {
        self.by_category(FieldCategory::Advanced)
    }

    fn by_category(&self, category: FieldCategory) -> Vec<&dyn QsubField> {
        self.fields()
            .filter(|f| f.descriptor().category == category)
            .collect()
    }

    /// Get field names
    pub fn names(&self) -> Vec<&str> {
        self.fields().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builds a [`FieldRegistry`] in insertion order
#[derive(Default)]
pub struct FieldRegistryBuilder {
    fields: Vec<Box<dyn QsubField>>,
}

impl FieldRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field
    pub fn field(self, field: impl QsubField + 'static) -> Self {
        self.boxed(Box::new(field))
    }

    /// Append an already boxed field. A field with the same name is replaced
    /// and the new one goes to the end.
    pub fn boxed(mut self, field: Box<dyn QsubField>) -> Self {
        self.fields.retain(|f| f.name() != field.name());
        self.fields.push(field);
        self
    }

    pub fn build(self) -> FieldRegistry {
        FieldRegistry {
            fields: self.fields,
        }
    }
}
