//! Integration tests for the Cloud Monitoring client and the idle detector

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use sweeper_lib::idle::{
    CloudMonitoringSource, IdleCatalog, IdleDetector, IdleMetric, IdleOutcome, MetricQuery,
    MetricSource, CPU_UTILIZATION_METRIC,
};
use sweeper_lib::models::{CloudItem, Instance, Provider, State as ItemState};
use sweeper_lib::MetricError;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(String, HashMap<String, String>)>>>,
    auth: Arc<Mutex<Vec<Option<String>>>>,
}

/// Two pages of CPU samples: 0.10 as DOUBLE, then 0 as INT64
async fn time_series(
    State(recorded): State<Recorded>,
    Path(project): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: axum::http::HeaderMap,
) -> impl IntoResponse {
    recorded
        .auth
        .lock()
        .unwrap()
        .push(headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_string));
    recorded
        .requests
        .lock()
        .unwrap()
        .push((project, params.clone()));

    match params.get("pageToken").map(String::as_str) {
        None => Json(json!({
            "timeSeries": [{
                "valueType": "DOUBLE",
                "points": (0..95).map(|_| json!({"value": {"doubleValue": 0.10}})).collect::<Vec<_>>()
            }],
            "nextPageToken": "page-2"
        })),
        Some(_) => Json(json!({
            "timeSeries": [{
                "valueType": "INT64",
                "points": (0..5).map(|_| json!({"value": {"int64Value": "0"}})).collect::<Vec<_>>()
            }]
        })),
    }
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn monitoring_server() -> (SocketAddr, Recorded) {
    let recorded = Recorded::default();
    let router = Router::new()
        .route("/v3/projects/:project/timeSeries", get(time_series))
        .with_state(recorded.clone());
    (spawn(router).await, recorded)
}

fn gcp_instance(name: &str, age_days: i64) -> CloudItem {
    CloudItem::Instance(Instance {
        id: format!("id-{}", name),
        name: name.to_string(),
        created: chrono::Utc::now() - chrono::Duration::days(age_days),
        provider: Provider::Gcp,
        tags: Default::default(),
        instance_type: "e2-small".to_string(),
        state: ItemState::Running,
        region: "us-central1".to_string(),
        ip_address: None,
        ephemeral: false,
        metadata: Default::default(),
    })
}

fn cpu_catalog(threshold: f64) -> IdleCatalog {
    IdleCatalog::new(vec![IdleMetric::new(CPU_UTILIZATION_METRIC, 0.95, threshold)]).unwrap()
}

#[tokio::test]
async fn test_fetch_pages_from_rest_api() {
    let (addr, recorded) = monitoring_server().await;
    let source =
        CloudMonitoringSource::new(format!("http://{}", addr), Some("token-1".into())).unwrap();

    let query = MetricQuery {
        project_id: "proj-1".into(),
        metric_type: CPU_UTILIZATION_METRIC.into(),
        instance_name: "vm-1".into(),
        start: chrono::Utc::now() - chrono::Duration::days(30),
        end: chrono::Utc::now(),
    };

    let first = source.fetch_page(&query, None).await.unwrap();
    assert_eq!(first.values.len(), 95);
    assert_eq!(first.next_page_token.as_deref(), Some("page-2"));

    let second = source.fetch_page(&query, Some("page-2")).await.unwrap();
    assert_eq!(second.values, vec![0.0; 5]);
    assert_eq!(second.next_page_token, None);

    let requests = recorded.requests.lock().unwrap();
    let (project, params) = &requests[0];
    assert_eq!(project, "proj-1");
    assert_eq!(params.get("filter"), Some(&query.filter_expression()));
    assert!(params.contains_key("interval.startTime"));
    assert!(params.contains_key("interval.endTime"));
    assert_eq!(
        recorded.auth.lock().unwrap()[0].as_deref(),
        Some("Bearer token-1")
    );
}

#[tokio::test]
async fn test_idle_classification_over_http() {
    let (addr, _) = monitoring_server().await;
    let source = Arc::new(CloudMonitoringSource::new(format!("http://{}", addr), None).unwrap());
    let cancel = CancellationToken::new();
    let item = gcp_instance("vm-idle", 45);

    let lenient = IdleDetector::new(source.clone(), "proj-1").with_catalog(cpu_catalog(0.15));
    assert_eq!(lenient.classify(&item, &cancel).await, IdleOutcome::Idle);

    let strict = IdleDetector::new(source, "proj-1").with_catalog(cpu_catalog(0.05));
    assert_eq!(strict.classify(&item, &cancel).await, IdleOutcome::Active);
}

#[tokio::test]
async fn test_young_instance_is_not_classified() {
    let (addr, recorded) = monitoring_server().await;
    let source = Arc::new(CloudMonitoringSource::new(format!("http://{}", addr), None).unwrap());

    let outcome = IdleDetector::new(source, "proj-1")
        .with_catalog(cpu_catalog(0.15))
        .classify(&gcp_instance("vm-new", 10), &CancellationToken::new())
        .await;

    assert_eq!(outcome, IdleOutcome::TooYoung);
    assert!(recorded.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_error_is_insufficient_data() {
    let router = Router::new().route(
        "/v3/projects/:project/timeSeries",
        get(|| async { (StatusCode::FORBIDDEN, "permission denied") }),
    );
    let addr = spawn(router).await;
    let source = CloudMonitoringSource::new(format!("http://{}", addr), None).unwrap();

    let query = MetricQuery {
        project_id: "proj-1".into(),
        metric_type: CPU_UTILIZATION_METRIC.into(),
        instance_name: "vm-1".into(),
        start: chrono::Utc::now() - chrono::Duration::days(30),
        end: chrono::Utc::now(),
    };
    let err = source.fetch_page(&query, None).await.unwrap_err();
    assert!(matches!(err, MetricError::Status { status: 403, .. }));

    let outcome = IdleDetector::new(Arc::new(source), "proj-1")
        .classify(&gcp_instance("vm-1", 45), &CancellationToken::new())
        .await;
    assert_eq!(outcome, IdleOutcome::InsufficientData);
}
