//! HTTP route handlers for the vector database API.

use crate::config::Credentials;
use crate::engine::LocalService;
use crate::error::{Result, VdbError};
use crate::server::AppState;
use crate::service::VectorService;
use crate::wire::{self, *};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tracing::{debug, warn};

/// Insert batches of the default workload are several megabytes of JSON.
const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

// --- Router ---

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(wire::AUTH_CHECK, post(auth_check))
        .route(wire::CREATE_DATABASE, post(create_database))
        .route(wire::LIST_DATABASES, post(list_databases))
        .route(wire::DROP_DATABASE, post(drop_database))
        .route(wire::CREATE_COLLECTION, post(create_collection))
        .route(wire::DESCRIBE_COLLECTION, post(describe_collection))
        .route(wire::HAS_COLLECTION, post(has_collection))
        .route(wire::LIST_COLLECTIONS, post(list_collections))
        .route(wire::DROP_COLLECTION, post(drop_collection))
        .route(wire::FLUSH, post(flush))
        .route(wire::NUM_ENTITIES, post(num_entities))
        .route(wire::LOAD, post(load))
        .route(wire::RELEASE, post(release))
        .route(wire::INSERT, post(insert))
        .route(wire::SEARCH, post(search))
        .route(wire::CREATE_INDEX, post(create_index))
        .route(wire::DESCRIBE_INDEX, post(describe_index))
        .route(wire::DROP_INDEX, post(drop_index))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route(wire::HEALTH, get(health))
        .merge(api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

// --- Helpers ---

fn status_for(error: &VdbError) -> StatusCode {
    match error {
        VdbError::Connection { .. } => StatusCode::UNAUTHORIZED,
        VdbError::NotFound { .. } => StatusCode::NOT_FOUND,
        VdbError::AlreadyExists { .. } => StatusCode::CONFLICT,
        VdbError::Protocol { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn reply<T: Serialize>(result: Result<T>) -> Response {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e),
    };
    (status, Json(Reply::from(result))).into_response()
}

/// Run a service call on the blocking pool; index builds and searches are
/// CPU bound.
async fn call<T, F>(state: AppState, f: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&LocalService) -> Result<T> + Send + 'static,
{
    let service = state.service;
    let result = tokio::task::spawn_blocking(move || f(&service))
        .await
        .unwrap_or_else(|e| Err(VdbError::protocol(format!("worker failed: {}", e))));
    if let Err(e) = &result {
        debug!(error = %e, "request failed");
    }
    reply(result)
}

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(Credentials::from_bearer);

    let verdict = match credentials {
        Some(c) => state.service.authenticate(&c.user, &c.password),
        None => Err(VdbError::connection("missing or malformed authorization header")),
    };
    match verdict {
        Ok(()) => next.run(request).await,
        Err(e) => {
            warn!(path = %request.uri().path(), "unauthorized request");
            reply::<()>(Err(e))
        }
    }
}

// --- Handlers ---

async fn health(State(state): State<AppState>) -> Response {
    let databases = state.service.list_databases().map(|dbs| dbs.len());
    match databases {
        Ok(databases) => Json(HealthReply {
            status: "ok".to_string(),
            databases,
        })
        .into_response(),
        Err(e) => reply::<()>(Err(e)),
    }
}

async fn auth_check() -> Response {
    reply(Ok(()))
}

async fn create_database(State(state): State<AppState>, Json(body): Json<DatabaseBody>) -> Response {
    call(state, move |s| s.create_database(&body.db_name)).await
}

async fn list_databases(State(state): State<AppState>, Json(_): Json<EmptyBody>) -> Response {
    call(state, |s| s.list_databases()).await
}

async fn drop_database(State(state): State<AppState>, Json(body): Json<DatabaseBody>) -> Response {
    call(state, move |s| s.drop_database(&body.db_name)).await
}

async fn create_collection(
    State(state): State<AppState>,
    Json(body): Json<CreateCollectionBody>,
) -> Response {
    call(state, move |s| {
        s.create_collection(&body.db_name, &body.collection_name, &body.schema)
    })
    .await
}

async fn describe_collection(
    State(state): State<AppState>,
    Json(body): Json<CollectionBody>,
) -> Response {
    call(state, move |s| s.describe_collection(&body.db_name, &body.collection_name)).await
}

async fn has_collection(State(state): State<AppState>, Json(body): Json<CollectionBody>) -> Response {
    call(state, move |s| s.has_collection(&body.db_name, &body.collection_name)).await
}

async fn list_collections(State(state): State<AppState>, Json(body): Json<DatabaseBody>) -> Response {
    call(state, move |s| s.list_collections(&body.db_name)).await
}

async fn drop_collection(
    State(state): State<AppState>,
    Json(body): Json<CollectionBody>,
) -> Response {
    call(state, move |s| s.drop_collection(&body.db_name, &body.collection_name)).await
}

async fn flush(State(state): State<AppState>, Json(body): Json<CollectionBody>) -> Response {
    call(state, move |s| s.flush(&body.db_name, &body.collection_name)).await
}

async fn num_entities(State(state): State<AppState>, Json(body): Json<CollectionBody>) -> Response {
    call(state, move |s| s.num_entities(&body.db_name, &body.collection_name)).await
}

async fn load(State(state): State<AppState>, Json(body): Json<CollectionBody>) -> Response {
    call(state, move |s| s.load(&body.db_name, &body.collection_name)).await
}

async fn release(State(state): State<AppState>, Json(body): Json<CollectionBody>) -> Response {
    call(state, move |s| s.release(&body.db_name, &body.collection_name)).await
}

async fn insert(State(state): State<AppState>, Json(body): Json<InsertBody>) -> Response {
    call(state, move |s| s.insert(&body.db_name, &body.collection_name, &body.data)).await
}

async fn search(State(state): State<AppState>, Json(body): Json<SearchBody>) -> Response {
    call(state, move |s| s.search(&body.db_name, &body.collection_name, &body.request)).await
}

async fn create_index(State(state): State<AppState>, Json(body): Json<CreateIndexBody>) -> Response {
    call(state, move |s| {
        s.create_index(
            &body.db_name,
            &body.collection_name,
            &body.field_name,
            &body.index_params,
        )
    })
    .await
}

async fn describe_index(State(state): State<AppState>, Json(body): Json<CollectionBody>) -> Response {
    call(state, move |s| s.describe_index(&body.db_name, &body.collection_name)).await
}

async fn drop_index(State(state): State<AppState>, Json(body): Json<CollectionBody>) -> Response {
    call(state, move |s| s.drop_index(&body.db_name, &body.collection_name)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(LocalService::new()))
    }

    fn post_json(path: &str, auth: Option<&str>, body: Value) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: Router, request: HttpRequest<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    const AUTH: Option<&str> = Some("Bearer root:Milvus");

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let request = HttpRequest::builder()
            .uri(wire::HEALTH)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "databases": 1}));
    }

    #[tokio::test]
    async fn test_rejects_missing_and_wrong_credentials() {
        let (status, body) = send(app(), post_json(wire::LIST_DATABASES, None, json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["kind"], "connection");

        let (status, _) = send(
            app(),
            post_json(wire::LIST_DATABASES, Some("Bearer root:nope"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_database_round_trip() {
        let app = app();
        let (status, _) = send(
            app.clone(),
            post_json(wire::CREATE_DATABASE, AUTH, json!({"dbName": "db1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            app.clone(),
            post_json(wire::CREATE_DATABASE, AUTH, json!({"dbName": "db1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "already_exists");

        let (_, body) = send(app, post_json(wire::LIST_DATABASES, AUTH, json!({}))).await;
        assert_eq!(body, json!({"status": "ok", "data": ["db1", "default"]}));
    }

    #[tokio::test]
    async fn test_missing_collection_is_404() {
        let (status, body) = send(
            app(),
            post_json(
                wire::NUM_ENTITIES,
                AUTH,
                json!({"dbName": "default", "collectionName": "nope"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "err");
        assert_eq!(body["error"]["resource"], "collection");
    }

    #[tokio::test]
    async fn test_search_before_load_is_400() {
        let service = LocalService::new();
        let schema = crate::schema::CollectionSchema::default_demo(2);
        service.create_collection("default", "c", &schema).unwrap();
        let app = router(AppState::new(service));

        let (status, body) = send(
            app,
            post_json(
                wire::SEARCH,
                AUTH,
                json!({
                    "dbName": "default",
                    "collectionName": "c",
                    "request": {
                        "data": [[0.0, 0.0]],
                        "anns_field": "fv",
                        "metric_type": "L2",
                        "limit": 1
                    }
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "err");
    }
}
