//! Composite value containers: tables, structs and arrays
//!
//! - [`Table`]: dynamically ordered named entries; the only container whose
//!   shape may change at runtime.
//! - [`StructValue`]: fixed named fields declared by a schema.
//! - [`ArrayValue`]: homogeneous indexed elements.

use crate::error::{Result, ValueError};
use crate::value::Property;
use crate::value_type::ValueType;

/// Insertion-ordered named properties with unique names
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    entries: Vec<(String, Property)>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from entries, rejecting duplicate names
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Property)>) -> Result<Self> {
        let mut table = Self::new();
        for (name, property) in entries {
            table.insert(name, property)?;
        }
        Ok(table)
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, name: impl Into<String>, property: Property) -> Self {
        self.set(name, property);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Position of the named entry
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.entries.iter_mut().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn get_at(&self, index: usize) -> Option<&Property> {
        self.entries.get(index).map(|(_, p)| p)
    }

    pub fn get_at_mut(&mut self, index: usize) -> Option<&mut Property> {
        self.entries.get_mut(index).map(|(_, p)| p)
    }

    /// Name of the entry at `index`
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(n, _)| n.as_str())
    }

    /// Append a new entry
    pub fn insert(&mut self, name: impl Into<String>, property: Property) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(ValueError::DuplicateProperty(name));
        }
        self.entries.push((name, property));
        Ok(())
    }

    /// Insert a new entry before `index` (appends if `index` is past the end)
    pub fn insert_at(&mut self, index: usize, name: impl Into<String>, property: Property) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(ValueError::DuplicateProperty(name));
        }
        let index = index.min(self.entries.len());
        self.entries.insert(index, (name, property));
        Ok(())
    }

    /// Replace the entry with the same name, or append
    pub fn set(&mut self, name: impl Into<String>, property: Property) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(existing) => *existing = property,
            None => self.entries.push((name, property)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Property> {
        let index = self.index_of(name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn remove_at(&mut self, index: usize) -> Option<(String, Property)> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    /// Rename an entry in place, keeping its position
    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> Result<()> {
        let to = to.into();
        if from != to && self.contains(&to) {
            return Err(ValueError::DuplicateProperty(to));
        }
        let index = self
            .index_of(from)
            .ok_or_else(|| ValueError::NoSuchProperty(from.to_string()))?;
        self.entries[index].0 = to;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Property)> {
        self.entries.iter_mut().map(|(n, p)| (n.as_str(), p))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Consume the table, yielding its entries in order
    pub fn into_entries(self) -> Vec<(String, Property)> {
        self.entries
    }
}

/// Fixed-layout record whose fields are declared by a schema
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    type_name: String,
    fields: Vec<(String, Property)>,
}

impl StructValue {
    /// Create a struct value with the given fields
    pub fn new(type_name: impl Into<String>, fields: Vec<(String, Property)>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Schema name of this struct
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.fields.iter_mut().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn get_at(&self, index: usize) -> Option<&Property> {
        self.fields.get(index).map(|(_, p)| p)
    }

    pub fn get_at_mut(&mut self, index: usize) -> Option<&mut Property> {
        self.fields.get_mut(index).map(|(_, p)| p)
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.fields.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Property)> {
        self.fields.iter_mut().map(|(n, p)| (n.as_str(), p))
    }
}

/// Homogeneous array; the element type is fixed for the array's lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    element_type: ValueType,
    elements: Vec<Property>,
}

impl ArrayValue {
    /// Create an empty array of the given element type
    pub fn new(element_type: ValueType) -> Self {
        Self {
            element_type,
            elements: Vec::new(),
        }
    }

    /// Create an array from elements, checking each element's type
    pub fn with_elements(element_type: ValueType, elements: Vec<Property>) -> Result<Self> {
        let mut array = Self::new(element_type);
        for element in elements {
            array.push(element)?;
        }
        Ok(array)
    }

    pub fn element_type(&self) -> &ValueType {
        &self.element_type
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Property> {
        self.elements.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Property> {
        self.elements.get_mut(index)
    }

    fn check(&self, property: &Property) -> Result<()> {
        let found = property.value.value_type();
        if found != self.element_type {
            return Err(ValueError::TypeMismatch {
                expected: self.element_type.clone(),
                found,
            });
        }
        Ok(())
    }

    /// Append an element
    pub fn push(&mut self, property: Property) -> Result<()> {
        self.check(&property)?;
        self.elements.push(property);
        Ok(())
    }

    /// Insert an element before `index` (appends if past the end)
    pub fn insert(&mut self, index: usize, property: Property) -> Result<()> {
        self.check(&property)?;
        let index = index.min(self.elements.len());
        self.elements.insert(index, property);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<Property> {
        if index < self.elements.len() {
            Some(self.elements.remove(index))
        } else {
            None
        }
    }

    /// Resize, filling new slots with clones of `fill`
    pub fn resize(&mut self, len: usize, fill: &Property) -> Result<()> {
        if len > self.elements.len() {
            self.check(fill)?;
        }
        self.elements.resize(len, fill.clone());
        Ok(())
    }

    /// Keep only elements matching the predicate
    pub fn retain(&mut self, f: impl FnMut(&Property) -> bool) {
        self.elements.retain(f);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.elements.iter_mut()
    }

    /// Map every element into a new array of the same element type.
    ///
    /// `f` must not change an element's value type; the result is not
    /// re-checked.
    pub(crate) fn map_elements(&self, f: impl FnMut(&Property) -> Property) -> Self {
        Self {
            element_type: self.element_type.clone(),
            elements: self.elements.iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_table_preserves_order() {
        let mut table = Table::new();
        table.insert("b", Property::new(1)).unwrap();
        table.insert("a", Property::new(2)).unwrap();
        table.insert_at(0, "c", Property::new(3)).unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), ["c", "b", "a"]);
    }

    #[test]
    fn test_table_rejects_duplicates() {
        let mut table = Table::new();
        table.insert("x", Property::new(true)).unwrap();
        assert_eq!(
            table.insert("x", Property::new(false)),
            Err(ValueError::DuplicateProperty("x".into()))
        );
        table.insert("y", Property::new(false)).unwrap();
        assert!(table.rename("y", "x").is_err());
        table.rename("y", "z").unwrap();
        assert_eq!(table.index_of("z"), Some(1));
    }

    #[test]
    fn test_array_is_homogeneous() {
        let mut array = ArrayValue::new(ValueType::Int);
        array.push(Property::new(1)).unwrap();
        let err = array.push(Property::new("two")).unwrap_err();
        assert!(matches!(err, ValueError::TypeMismatch { .. }));
        array.resize(3, &Property::new(0)).unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(array.get(2).unwrap().value, Value::Int(0));
    }
}
