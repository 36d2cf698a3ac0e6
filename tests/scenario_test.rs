//! The stock demonstration at full size: 10 000 vectors of dimension 128,
//! IVF_FLAT with 1024 lists, three self-queries with nprobe 16.

use std::sync::Arc;
use vdb_workflow::{IndexType, LocalService, MetricType, VdbError, Workflow, WorkflowConfig};

#[test]
fn test_default_scenario() {
    let config = WorkflowConfig {
        seed: Some(2024),
        ..WorkflowConfig::default()
    };
    let mut workflow = Workflow::new(config);
    workflow.connect_with(Arc::new(LocalService::new())).unwrap();

    let report = workflow.run().unwrap();
    let rw = &report.read_write;

    assert_eq!(rw.num_entities, 10_000);
    assert_eq!(rw.index.index_type, IndexType::IvfFlat);
    assert_eq!(rw.index.metric_type, MetricType::L2);
    assert_eq!(rw.index.params.nlist, Some(1024));
    assert_eq!(rw.index.indexed_rows, 10_000);
    assert_eq!(
        rw.index.to_string(),
        "{field: fv, index_type: IVF_FLAT, metric_type: L2, nlist: 1024}"
    );

    assert_eq!(rw.queries.len(), 3);
    assert_eq!(rw.results.len(), 3);
    for (i, hits) in rw.results.iter().enumerate() {
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, i as i64);
        assert!(hits[0].distance.abs() < 1e-4);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    assert_eq!(
        report.collections,
        vec!["col1_db1".to_string(), "col1_db2".to_string()]
    );
    assert_eq!(report.databases, vec!["default".to_string()]);

    // the collection created before switching databases is left in place
    let conn = workflow.connection().unwrap();
    assert_eq!(conn.list_collections().unwrap(), vec!["col1_db1".to_string()]);
    assert!(matches!(
        conn.using_database("db1"),
        Err(VdbError::NotFound { .. })
    ));
}
