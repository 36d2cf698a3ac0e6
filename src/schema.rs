//! Collection schema declaration and validation

use crate::error::{Result, VdbError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Largest vector dimension a collection may declare.
pub const MAX_DIMENSION: usize = 32_768;

/// Column data types supported by collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Int64,
    Double,
    FloatVector,
}

impl DataType {
    pub fn is_vector(&self) -> bool {
        matches!(self, DataType::FloatVector)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int64 => "INT64",
            DataType::Double => "DOUBLE",
            DataType::FloatVector => "FLOAT_VECTOR",
        };
        f.write_str(name)
    }
}

/// A single field of a collection schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub dtype: DataType,
    #[serde(default)]
    pub is_primary: bool,
    /// Vector dimension, required for vector fields only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<usize>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            dtype,
            is_primary: false,
            dim: None,
            description: String::new(),
        }
    }

    /// An INT64 primary key field.
    pub fn primary_int64(name: impl Into<String>) -> Self {
        Self {
            is_primary: true,
            ..Self::new(name, DataType::Int64)
        }
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Int64)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Double)
    }

    /// A FLOAT_VECTOR field of fixed dimension.
    pub fn float_vector(name: impl Into<String>, dim: usize) -> Self {
        Self {
            dim: Some(dim),
            ..Self::new(name, DataType::FloatVector)
        }
    }
}

/// Ordered field layout of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub fields: Vec<FieldSchema>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl CollectionSchema {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self {
            fields,
            description: String::new(),
        }
    }

    /// The demonstration layout: `id` primary key, `double` scalar, `fv` vector.
    pub fn default_demo(dim: usize) -> Self {
        Self::new(vec![
            FieldSchema::primary_int64("id"),
            FieldSchema::double("double"),
            FieldSchema::float_vector("fv", dim),
        ])
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }

    pub fn vector_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.dtype.is_vector())
    }

    /// Check the field layout. Runs before any collection is created from it.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(VdbError::schema("schema has no fields"));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(VdbError::schema("field name must not be empty"));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(VdbError::schema(format!(
                    "duplicate field name: {}",
                    field.name
                )));
            }
            validate_field(field)?;
        }

        let primaries: Vec<&FieldSchema> = self.fields.iter().filter(|f| f.is_primary).collect();
        match primaries.as_slice() {
            [] => return Err(VdbError::schema("schema must declare a primary key field")),
            [pk] if pk.dtype != DataType::Int64 => {
                return Err(VdbError::schema(format!(
                    "primary key field {} must be INT64, got {}",
                    pk.name, pk.dtype
                )))
            }
            [_] => {}
            _ => return Err(VdbError::schema("schema declares more than one primary key")),
        }

        if self.vector_fields().next().is_none() {
            return Err(VdbError::schema("schema must declare a vector field"));
        }

        Ok(())
    }
}

fn validate_field(field: &FieldSchema) -> Result<()> {
    match (field.dtype.is_vector(), field.dim) {
        (true, None) => Err(VdbError::schema(format!(
            "vector field {} is missing a dimension",
            field.name
        ))),
        (true, Some(dim)) if dim == 0 || dim > MAX_DIMENSION => Err(VdbError::schema(format!(
            "vector field {} has invalid dimension {} (allowed 1..={})",
            field.name, dim, MAX_DIMENSION
        ))),
        (false, Some(_)) => Err(VdbError::schema(format!(
            "scalar field {} must not declare a dimension",
            field.name
        ))),
        _ => Ok(()),
    }
}
