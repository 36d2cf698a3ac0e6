//! End-to-end tests over HTTP against the reference server

use std::net::SocketAddr;
use std::sync::Arc;
use vdb_workflow::config::IndexConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use vdb_workflow::{
    generate_rows, server, CollectionSchema, ConnectionConfig, Connections, Credentials,
    HttpService, IndexParams, LocalService, MetricType, SearchRequest, VdbError, VectorService,
    Workflow, WorkflowConfig,
};

/// Start a server on an ephemeral port in a background thread.
fn spawn_server(service: LocalService) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            server::serve_listener(listener, service).await.unwrap();
        });
    });
    addr
}

fn config_for(addr: SocketAddr) -> ConnectionConfig {
    ConnectionConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        timeout_secs: Some(60),
        ..ConnectionConfig::default()
    }
}

#[test]
fn test_workflow_over_http() {
    let addr = spawn_server(LocalService::new());
    let config = WorkflowConfig {
        connection: config_for(addr),
        dim: 16,
        num_entities: 1000,
        index: IndexConfig {
            nlist: 32,
            ..IndexConfig::default()
        },
        seed: Some(11),
        ..WorkflowConfig::default()
    };

    let mut workflow = Workflow::new(config);
    let report = workflow.run().unwrap();

    assert_eq!(report.read_write.num_entities, 1000);
    assert_eq!(report.read_write.index.params.nlist, Some(32));
    for (i, hits) in report.read_write.results.iter().enumerate() {
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, i as i64);
    }
    assert_eq!(
        report.collections,
        vec!["col1_db1".to_string(), "col1_db2".to_string()]
    );
    assert_eq!(report.databases, vec!["default".to_string()]);
}

#[test]
fn test_errors_cross_the_wire() {
    let addr = spawn_server(LocalService::new());
    let service = HttpService::new(&config_for(addr));
    service.authenticate("root", "Milvus").unwrap();

    assert!(service
        .num_entities("default", "missing")
        .unwrap_err()
        .is_not_found());

    service
        .create_collection("default", "c", &CollectionSchema::default_demo(4))
        .unwrap();
    assert!(matches!(
        service.create_collection("default", "c", &CollectionSchema::default_demo(4)),
        Err(VdbError::AlreadyExists { .. })
    ));

    let request = SearchRequest::new("fv", vec![vec![0.0; 4]]);
    assert!(matches!(
        service.search("default", "c", &request),
        Err(VdbError::Search { .. })
    ));
    assert!(matches!(
        service.load("default", "c"),
        Err(VdbError::Load { .. })
    ));
}

#[test]
fn test_wrong_credentials_refused() {
    let addr = spawn_server(LocalService::with_credentials(Credentials::new(
        "root", "secret",
    )));
    let connections = Connections::new();
    let result = connections.connect("default", config_for(addr));
    assert!(matches!(result, Err(VdbError::Connection { .. })));
    assert!(!connections.has_connection("default"));

    let config = ConnectionConfig {
        password: "secret".to_string(),
        ..config_for(addr)
    };
    let conn = connections.connect("default", config).unwrap();
    assert_eq!(conn.list_databases().unwrap(), vec!["default".to_string()]);
}

#[test]
fn test_handles_share_server_state() {
    let service = LocalService::new();
    let addr = spawn_server(service.clone());
    let remote: Arc<dyn VectorService> = Arc::new(HttpService::new(&config_for(addr)));
    remote.authenticate("root", "Milvus").unwrap();
    remote.create_database("db1").unwrap();

    assert!(service.list_databases().unwrap().contains(&"db1".to_string()));
}

#[test]
fn test_deeply_nested_filter_leaves_server_running() {
    let addr = spawn_server(LocalService::new());
    let service = HttpService::new(&config_for(addr));
    service.authenticate("root", "Milvus").unwrap();

    let schema = CollectionSchema::default_demo(4);
    service.create_collection("default", "c", &schema).unwrap();
    let data = generate_rows(&schema, 20, &mut StdRng::seed_from_u64(4));
    service.insert("default", "c", &data).unwrap();
    service.flush("default", "c").unwrap();
    service
        .create_index("default", "c", "fv", &IndexParams::flat(MetricType::L2))
        .unwrap();
    service.load("default", "c").unwrap();

    let n = 100_000;
    let nested = format!("{}id >= 0", "!".repeat(n));
    let request = SearchRequest::new("fv", vec![vec![0.5; 4]]).expr(nested);
    assert!(matches!(
        service.search("default", "c", &request),
        Err(VdbError::Search { .. })
    ));

    let request = SearchRequest::new("fv", vec![vec![0.5; 4]]).limit(5);
    assert_eq!(service.search("default", "c", &request).unwrap()[0].len(), 5);
}
