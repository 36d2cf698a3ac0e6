//! Columnar insert batches and synthetic row generation

use crate::error::{Result, VdbError};
use crate::schema::{CollectionSchema, DataType};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Values of one column in an insert batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnValues {
    Int64(Vec<i64>),
    Double(Vec<f64>),
    FloatVector(Vec<Vec<f32>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int64(v) => v.len(),
            ColumnValues::Double(v) => v.len(),
            ColumnValues::FloatVector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnValues::Int64(_) => DataType::Int64,
            ColumnValues::Double(_) => DataType::Double,
            ColumnValues::FloatVector(_) => DataType::FloatVector,
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldColumn {
    pub name: String,
    pub values: ColumnValues,
}

impl FieldColumn {
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// A batch of rows submitted in one insert call, one column per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertData {
    pub columns: Vec<FieldColumn>,
}

impl InsertData {
    pub fn new(columns: Vec<FieldColumn>) -> Self {
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<&FieldColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Row count, taken from the first column.
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    /// Borrow the vectors of a FLOAT_VECTOR column.
    pub fn vectors(&self, name: &str) -> Option<&[Vec<f32>]> {
        match self.column(name).map(|c| &c.values) {
            Some(ColumnValues::FloatVector(v)) => Some(v),
            _ => None,
        }
    }

    /// Check this batch against a collection schema.
    ///
    /// Every schema field must be present exactly once with the declared
    /// type, all columns must have the same row count, and every vector must
    /// have the declared dimension.
    pub fn validate(&self, schema: &CollectionSchema) -> Result<()> {
        if self.columns.is_empty() || self.num_rows() == 0 {
            return Err(VdbError::insert("insert batch is empty"));
        }

        for column in &self.columns {
            if schema.field(&column.name).is_none() {
                return Err(VdbError::insert(format!(
                    "field {} does not exist in the collection schema",
                    column.name
                )));
            }
            if self.columns.iter().filter(|c| c.name == column.name).count() > 1 {
                return Err(VdbError::insert(format!(
                    "field {} appears more than once",
                    column.name
                )));
            }
        }

        let expected_rows = self.num_rows();
        for field in &schema.fields {
            let column = self.column(&field.name).ok_or_else(|| {
                VdbError::insert(format!("missing data for field {}", field.name))
            })?;

            if column.values.data_type() != field.dtype {
                return Err(VdbError::insert(format!(
                    "field {} expects {}, got {}",
                    field.name,
                    field.dtype,
                    column.values.data_type()
                )));
            }

            if column.values.len() != expected_rows {
                return Err(VdbError::insert(format!(
                    "row count mismatch: field {} has {} rows, expected {}",
                    field.name,
                    column.values.len(),
                    expected_rows
                )));
            }

            if let (ColumnValues::FloatVector(vectors), Some(dim)) = (&column.values, field.dim) {
                if let Some((row, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
                    return Err(VdbError::insert(format!(
                        "dimension mismatch in field {} at row {}: expected {}, got {}",
                        field.name,
                        row,
                        dim,
                        v.len()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Generate `count` synthetic rows for `schema`.
///
/// Primary keys are `0..count`, other INT64 fields are random, DOUBLE fields
/// and vector components are uniform in `[0, 1)`.
pub fn generate_rows<R: Rng>(
    schema: &CollectionSchema,
    count: usize,
    rng: &mut R,
) -> InsertData {
    let columns = schema
        .fields
        .iter()
        .map(|field| {
            let values = match field.dtype {
                DataType::Int64 if field.is_primary => {
                    ColumnValues::Int64((0..count as i64).collect())
                }
                DataType::Int64 => {
                    ColumnValues::Int64((0..count).map(|_| rng.gen_range(0..i64::MAX)).collect())
                }
                DataType::Double => ColumnValues::Double((0..count).map(|_| rng.gen::<f64>()).collect()),
                DataType::FloatVector => {
                    let dim = field.dim.unwrap_or(0);
                    ColumnValues::FloatVector(random_vectors(count, dim, rng))
                }
            };
            FieldColumn::new(field.name.clone(), values)
        })
        .collect();

    InsertData::new(columns)
}

/// `count` vectors of `dim` components uniform in `[0, 1)`.
pub fn random_vectors<R: Rng>(count: usize, dim: usize, rng: &mut R) -> Vec<Vec<f32>> {
    (0..count)
        .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
        .collect()
}
