//! Server-side collection state: rows, flush buffer, index, load state.

use crate::data::{ColumnValues, InsertData};
use crate::distance::{norm, MetricType};
use crate::error::{Result, VdbError};
use crate::expr::{Expr, ScalarColumn};
use crate::index::{build_index, IndexParams, VectorIndex};
use crate::schema::{CollectionSchema, DataType};
use crate::service::{
    FieldValue, Hit, IndexDescription, InsertResult, SearchRequest, SearchResults,
    MAX_SEARCH_LIMIT,
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Typed columns aligned with the schema's field order.
#[derive(Debug, Clone)]
struct Columns {
    values: Vec<ColumnValues>,
}

impl Columns {
    fn empty(schema: &CollectionSchema) -> Self {
        let values = schema
            .fields
            .iter()
            .map(|f| match f.dtype {
                DataType::Int64 => ColumnValues::Int64(Vec::new()),
                DataType::Double => ColumnValues::Double(Vec::new()),
                DataType::FloatVector => ColumnValues::FloatVector(Vec::new()),
            })
            .collect();
        Self { values }
    }

    fn len(&self) -> usize {
        self.values.first().map(ColumnValues::len).unwrap_or(0)
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a batch already validated against `schema`.
    fn append(&mut self, schema: &CollectionSchema, data: InsertData) {
        for column in data.columns {
            let Some(pos) = schema.field_position(&column.name) else {
                continue;
            };
            match (&mut self.values[pos], column.values) {
                (ColumnValues::Int64(dst), ColumnValues::Int64(src)) => dst.extend(src),
                (ColumnValues::Double(dst), ColumnValues::Double(src)) => dst.extend(src),
                (ColumnValues::FloatVector(dst), ColumnValues::FloatVector(src)) => dst.extend(src),
                _ => {}
            }
        }
    }

    fn extend(&mut self, other: Columns) {
        for (dst, src) in self.values.iter_mut().zip(other.values) {
            match (dst, src) {
                (ColumnValues::Int64(dst), ColumnValues::Int64(src)) => dst.extend(src),
                (ColumnValues::Double(dst), ColumnValues::Double(src)) => dst.extend(src),
                (ColumnValues::FloatVector(dst), ColumnValues::FloatVector(src)) => dst.extend(src),
                _ => {}
            }
        }
    }

    fn int64(&self, pos: usize) -> &[i64] {
        match &self.values[pos] {
            ColumnValues::Int64(v) => v,
            _ => &[],
        }
    }

    fn vectors(&self, pos: usize) -> &[Vec<f32>] {
        match &self.values[pos] {
            ColumnValues::FloatVector(v) => v,
            _ => &[],
        }
    }

    fn value(&self, pos: usize, row: usize) -> Option<FieldValue> {
        match &self.values[pos] {
            ColumnValues::Int64(v) => v.get(row).map(|&x| FieldValue::Int64(x)),
            ColumnValues::Double(v) => v.get(row).map(|&x| FieldValue::Double(x)),
            ColumnValues::FloatVector(_) => None,
        }
    }
}

#[derive(Debug)]
struct FieldIndex {
    field_name: String,
    params: IndexParams,
    index: Box<dyn VectorIndex>,
}

/// A named collection inside a database.
#[derive(Debug)]
pub struct Collection {
    name: String,
    schema: CollectionSchema,
    /// Flushed rows: counted, indexed, searchable
    sealed: Columns,
    /// Inserted but not yet flushed
    pending: Columns,
    index: Option<FieldIndex>,
    loaded: bool,
}

impl Collection {
    /// Create an empty collection. The schema must already be validated.
    pub fn new(name: impl Into<String>, schema: CollectionSchema) -> Self {
        Self {
            name: name.into(),
            sealed: Columns::empty(&schema),
            pending: Columns::empty(&schema),
            schema,
            index: None,
            loaded: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Rows made visible by `flush`.
    pub fn num_entities(&self) -> usize {
        self.sealed.len()
    }

    /// Rows waiting for the next `flush`.
    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    fn primary_position(&self) -> usize {
        self.schema
            .fields
            .iter()
            .position(|f| f.is_primary)
            .unwrap_or(0)
    }

    /// Buffer a batch of rows until the next flush.
    pub fn insert(&mut self, data: InsertData) -> Result<InsertResult> {
        data.validate(&self.schema)?;

        let pk = &self.schema.fields[self.primary_position()].name;
        let ids = match data.column(pk).map(|c| &c.values) {
            Some(ColumnValues::Int64(ids)) => ids.clone(),
            _ => return Err(VdbError::insert(format!("missing primary key field {}", pk))),
        };

        let insert_count = ids.len();
        self.pending.append(&self.schema, data);
        debug!(collection = %self.name, rows = insert_count, pending = self.pending.len(), "buffered insert");

        Ok(InsertResult { insert_count, ids })
    }

    /// Seal buffered rows and feed them to the index, if any.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        if let Some(field_index) = &mut self.index {
            let pos = self
                .schema
                .field_position(&field_index.field_name)
                .ok_or_else(|| VdbError::index(format!("indexed field {} vanished", field_index.field_name)))?;
            field_index.index.add(self.pending.vectors(pos))?;
        }

        let pending = std::mem::replace(&mut self.pending, Columns::empty(&self.schema));
        let rows = pending.len();
        self.sealed.extend(pending);
        info!(collection = %self.name, rows, total = self.sealed.len(), "flushed");
        Ok(())
    }

    pub fn create_index(&mut self, field: &str, params: &IndexParams) -> Result<()> {
        let pos = self
            .schema
            .field_position(field)
            .ok_or_else(|| VdbError::index(format!("field {} does not exist", field)))?;
        let field_schema = &self.schema.fields[pos];
        if !field_schema.dtype.is_vector() {
            return Err(VdbError::index(format!(
                "field {} is {}, only vector fields can be indexed",
                field, field_schema.dtype
            )));
        }
        params.validate()?;

        if let Some(existing) = &self.index {
            if existing.field_name == field && existing.params == *params {
                return Ok(());
            }
            return Err(VdbError::index(format!(
                "collection {} already has an index on {}; drop it first",
                self.name, existing.field_name
            )));
        }

        let dim = field_schema.dim.unwrap_or(0);
        let index = build_index(params, dim, self.sealed.vectors(pos))?;
        info!(
            collection = %self.name,
            field,
            index_type = %params.index_type,
            metric = %params.metric_type,
            rows = index.len(),
            "built index"
        );
        self.index = Some(FieldIndex {
            field_name: field.to_string(),
            params: *params,
            index,
        });
        Ok(())
    }

    pub fn describe_index(&self) -> Result<IndexDescription> {
        let field_index = self.index.as_ref().ok_or_else(|| self.index_not_found())?;
        Ok(IndexDescription {
            field_name: field_index.field_name.clone(),
            index_type: field_index.params.index_type,
            metric_type: field_index.params.metric_type,
            params: field_index.params.params,
            indexed_rows: field_index.index.len(),
        })
    }

    pub fn drop_index(&mut self) -> Result<()> {
        let dropped = self.index.take().ok_or_else(|| self.index_not_found())?;
        info!(collection = %self.name, field = %dropped.field_name, "dropped index");
        Ok(())
    }

    fn index_not_found(&self) -> VdbError {
        VdbError::NotFound {
            resource: "index".to_string(),
            name: self.name.clone(),
        }
    }

    /// Mark the collection searchable. Requires an index.
    pub fn load(&mut self) -> Result<()> {
        if self.index.is_none() {
            return Err(VdbError::load(format!(
                "collection {} has no index on any vector field",
                self.name
            )));
        }
        self.loaded = true;
        Ok(())
    }

    pub fn release(&mut self) {
        self.loaded = false;
    }

    /// Run a batch search over the flushed rows.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let pos = self.schema.field_position(&request.anns_field).ok_or_else(|| {
            VdbError::search(format!("field {} does not exist", request.anns_field))
        })?;
        let field = &self.schema.fields[pos];
        if !field.dtype.is_vector() {
            return Err(VdbError::search(format!(
                "field {} is not a vector field",
                request.anns_field
            )));
        }
        let field_index = match &self.index {
            Some(fi) if fi.field_name == request.anns_field => fi,
            _ => {
                return Err(VdbError::search(format!(
                    "field {} has no index",
                    request.anns_field
                )))
            }
        };
        if !self.loaded {
            return Err(VdbError::load(format!(
                "collection {} is not loaded",
                self.name
            )));
        }

        self.validate_request(request, field.dim.unwrap_or(0), field_index)?;

        let mask = match request.expr.as_deref().map(str::trim) {
            Some(expr) if !expr.is_empty() => Some(self.evaluate_filter(expr)?),
            _ => None,
        };
        let output_positions = self.output_positions(&request.output_fields)?;
        let ids = self.sealed.int64(self.primary_position());

        request
            .data
            .par_iter()
            .map(|query| -> Result<Vec<Hit>> {
                let ranked = field_index.index.search(
                    query,
                    request.limit,
                    &request.params,
                    mask.as_deref(),
                )?;
                Ok(ranked
                    .into_iter()
                    .map(|(offset, distance)| Hit {
                        id: ids.get(offset).copied().unwrap_or(offset as i64),
                        distance,
                        fields: output_positions
                            .iter()
                            .filter_map(|(name, pos)| {
                                self.sealed.value(*pos, offset).map(|v| (name.clone(), v))
                            })
                            .collect::<BTreeMap<_, _>>(),
                    })
                    .collect())
            })
            .collect()
    }

    fn validate_request(
        &self,
        request: &SearchRequest,
        dim: usize,
        field_index: &FieldIndex,
    ) -> Result<()> {
        if request.data.is_empty() {
            return Err(VdbError::search("no query vectors"));
        }
        if request.limit == 0 || request.limit > MAX_SEARCH_LIMIT {
            return Err(VdbError::search(format!(
                "limit {} out of range 1..={}",
                request.limit, MAX_SEARCH_LIMIT
            )));
        }
        request.params.validate()?;
        if request.metric_type != field_index.params.metric_type {
            return Err(VdbError::search(format!(
                "metric type {} does not match index metric {}",
                request.metric_type, field_index.params.metric_type
            )));
        }
        if let Some(v) = request.data.iter().find(|v| v.len() != dim) {
            return Err(VdbError::search(format!(
                "query dimension mismatch: expected {}, got {}",
                dim,
                v.len()
            )));
        }
        if request.metric_type == MetricType::Cosine
            && request.data.iter().any(|v| norm(v) == 0.0)
        {
            return Err(VdbError::search("zero query vector under COSINE"));
        }
        Ok(())
    }

    fn evaluate_filter(&self, expr: &str) -> Result<Vec<bool>> {
        let parsed = Expr::parse(expr)?;
        parsed.evaluate(self.sealed.len(), &|name: &str| self.filter_column(name))
    }

    fn filter_column(&self, name: &str) -> Result<ScalarColumn<'_>> {
        let pos = self.schema.field_position(name).ok_or_else(|| {
            VdbError::search(format!("filter references unknown field {}", name))
        })?;
        match &self.sealed.values[pos] {
            ColumnValues::Int64(v) => Ok(ScalarColumn::Int64(v)),
            ColumnValues::Double(v) => Ok(ScalarColumn::Double(v)),
            ColumnValues::FloatVector(_) => Err(VdbError::search(format!(
                "filter cannot reference vector field {}",
                name
            ))),
        }
    }

    fn output_positions(&self, fields: &[String]) -> Result<Vec<(String, usize)>> {
        fields
            .iter()
            .map(|name| {
                let pos = self.schema.field_position(name).ok_or_else(|| {
                    VdbError::search(format!("output field {} does not exist", name))
                })?;
                if self.schema.fields[pos].dtype.is_vector() {
                    return Err(VdbError::search(format!(
                        "output field {} is a vector field",
                        name
                    )));
                }
                Ok((name.clone(), pos))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_rows;
    use crate::distance::MetricType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn loaded_collection(rows: usize) -> (Collection, InsertData) {
        let schema = CollectionSchema::default_demo(8);
        let mut collection = Collection::new("c", schema.clone());
        let data = generate_rows(&schema, rows, &mut StdRng::seed_from_u64(5));
        collection.insert(data.clone()).unwrap();
        collection.flush().unwrap();
        collection
            .create_index("fv", &IndexParams::flat(MetricType::L2))
            .unwrap();
        collection.load().unwrap();
        (collection, data)
    }

    #[test]
    fn test_flush_controls_visibility() {
        let schema = CollectionSchema::default_demo(4);
        let mut collection = Collection::new("c", schema.clone());
        let data = generate_rows(&schema, 10, &mut StdRng::seed_from_u64(1));
        let result = collection.insert(data).unwrap();

        assert_eq!(result.insert_count, 10);
        assert_eq!(collection.num_entities(), 0);
        assert_eq!(collection.num_pending(), 10);

        collection.flush().unwrap();
        collection.flush().unwrap();
        assert_eq!(collection.num_entities(), 10);
        assert_eq!(collection.num_pending(), 0);
    }

    #[test]
    fn test_index_on_scalar_field_rejected() {
        let mut collection = Collection::new("c", CollectionSchema::default_demo(4));
        let err = collection
            .create_index("double", &IndexParams::flat(MetricType::L2))
            .unwrap_err();
        assert!(matches!(err, VdbError::Index { .. }));
        assert!(collection
            .create_index("missing", &IndexParams::flat(MetricType::L2))
            .is_err());
    }

    #[test]
    fn test_conflicting_index_rejected_identical_accepted() {
        let mut collection = Collection::new("c", CollectionSchema::default_demo(4));
        let params = IndexParams::ivf_flat(MetricType::L2, 4);
        collection.create_index("fv", &params).unwrap();
        collection.create_index("fv", &params).unwrap();
        assert!(matches!(
            collection.create_index("fv", &IndexParams::flat(MetricType::L2)),
            Err(VdbError::Index { .. })
        ));
    }

    #[test]
    fn test_load_requires_index() {
        let mut collection = Collection::new("c", CollectionSchema::default_demo(4));
        assert!(matches!(collection.load(), Err(VdbError::Load { .. })));
    }

    #[test]
    fn test_rows_flushed_after_index_are_searchable() {
        let (mut collection, _) = loaded_collection(20);
        let extra = crate::data::InsertData::new(vec![
            crate::data::FieldColumn::new("id", ColumnValues::Int64(vec![100])),
            crate::data::FieldColumn::new("double", ColumnValues::Double(vec![0.5])),
            crate::data::FieldColumn::new("fv", ColumnValues::FloatVector(vec![vec![9.0; 8]])),
        ]);
        collection.insert(extra).unwrap();
        collection.flush().unwrap();
        assert_eq!(collection.describe_index().unwrap().indexed_rows, 21);

        let request = SearchRequest::new("fv", vec![vec![9.0; 8]]).limit(1);
        let hits = collection.search(&request).unwrap();
        assert_eq!(hits[0][0].id, 100);
    }

    #[test]
    fn test_search_with_filter_and_output_fields() {
        let (collection, _) = loaded_collection(50);
        let request = SearchRequest::new("fv", vec![vec![0.5; 8]])
            .limit(10)
            .expr("id >= 40")
            .output_fields(vec!["double".to_string()]);
        let hits = &collection.search(&request).unwrap()[0];

        assert_eq!(hits.len(), 10);
        assert!(hits.iter().all(|h| h.id >= 40));
        assert!(hits.iter().all(|h| h.fields.contains_key("double")));
    }

    #[test]
    fn test_search_validation() {
        let (mut collection, data) = loaded_collection(10);
        let query = data.vectors("fv").unwrap()[0].clone();

        let bad = [
            SearchRequest::new("fv", vec![query.clone()]).limit(0),
            SearchRequest::new("fv", vec![query.clone()]).limit(MAX_SEARCH_LIMIT + 1),
            SearchRequest::new("fv", vec![query.clone()]).metric_type(MetricType::Ip),
            SearchRequest::new("fv", vec![vec![0.0; 3]]),
            SearchRequest::new("fv", vec![]),
            SearchRequest::new("double", vec![query.clone()]),
            SearchRequest::new("fv", vec![query.clone()]).expr("id_field >= 0"),
            SearchRequest::new("fv", vec![query.clone()]).expr("fv > 1"),
            SearchRequest::new("fv", vec![query.clone()]).nprobe(0),
        ];
        for request in &bad {
            assert!(
                matches!(collection.search(request), Err(VdbError::Search { .. })),
                "accepted {:?}",
                request
            );
        }

        collection.release();
        assert!(matches!(
            collection.search(&SearchRequest::new("fv", vec![query])),
            Err(VdbError::Load { .. })
        ));
    }

    #[test]
    fn test_deeply_nested_filter_is_search_error() {
        let (collection, data) = loaded_collection(10);
        let query = data.vectors("fv").unwrap()[0].clone();
        let n = 100_000;
        let expr = format!("{}id >= 0{}", "(".repeat(n), ")".repeat(n));
        let request = SearchRequest::new("fv", vec![query]).expr(expr);
        assert!(matches!(
            collection.search(&request),
            Err(VdbError::Search { .. })
        ));
    }

    #[test]
    fn test_zero_query_rejected_under_cosine() {
        let schema = CollectionSchema::default_demo(4);
        let mut collection = Collection::new("c", schema.clone());
        collection
            .insert(generate_rows(&schema, 10, &mut StdRng::seed_from_u64(2)))
            .unwrap();
        collection.flush().unwrap();
        collection
            .create_index("fv", &IndexParams::flat(MetricType::Cosine))
            .unwrap();
        collection.load().unwrap();

        let zero = SearchRequest::new("fv", vec![vec![0.0; 4]]).metric_type(MetricType::Cosine);
        assert!(matches!(collection.search(&zero), Err(VdbError::Search { .. })));

        let unit = SearchRequest::new("fv", vec![vec![1.0, 0.0, 0.0, 0.0]])
            .metric_type(MetricType::Cosine)
            .limit(3);
        assert_eq!(collection.search(&unit).unwrap()[0].len(), 3);
    }

    #[test]
    fn test_ivf_index_created_on_empty_collection_keeps_rows_findable() {
        let schema = CollectionSchema::default_demo(8);
        let mut collection = Collection::new("c", schema.clone());
        collection
            .create_index("fv", &IndexParams::ivf_flat(MetricType::L2, 8))
            .unwrap();
        collection.load().unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        let first = generate_rows(&schema, 1, &mut rng);
        collection.insert(first.clone()).unwrap();
        collection.flush().unwrap();

        let mut rest = generate_rows(&schema, 60, &mut rng);
        if let ColumnValues::Int64(ids) = &mut rest.columns[0].values {
            ids.iter_mut().for_each(|id| *id += 1);
        }
        collection.insert(rest.clone()).unwrap();
        collection.flush().unwrap();
        assert_eq!(collection.describe_index().unwrap().indexed_rows, 61);

        let mut vectors = first.vectors("fv").unwrap().to_vec();
        vectors.extend_from_slice(rest.vectors("fv").unwrap());
        for (id, v) in vectors.iter().enumerate() {
            let request = SearchRequest::new("fv", vec![v.clone()]).limit(1).nprobe(1);
            assert_eq!(collection.search(&request).unwrap()[0][0].id, id as i64);
        }
    }
}
