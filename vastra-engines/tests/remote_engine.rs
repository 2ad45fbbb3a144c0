use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use vastra_engines::RemoteEngine;
use vastra_job_queue::{InferenceEngine, InferenceError, InferenceRequest, JobId};

const SUBJECT: &[u8] = b"\x89PNG\r\n\x1a\nsubject";
const GARMENT: &[u8] = b"\xff\xd8\xffgarment";
const RESULT: &[u8] = b"\x89PNG\r\n\x1a\nrendered";

#[derive(Default)]
struct MockModel {
    fail_process: bool,
    submissions: AtomicUsize,
    fields: Mutex<Vec<(String, String, usize)>>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn submit(State(mock): State<Arc<MockModel>>, mut multipart: Multipart) -> Json<Value> {
    let n = mock.submissions.fetch_add(1, Ordering::SeqCst);
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await.unwrap();
        mock.fields.lock().await.push((name, content_type, data.len()));
    }
    Json(json!({ "job_id": format!("remote-{n}") }))
}

async fn process(State(mock): State<Arc<MockModel>>, Path(id): Path<String>) -> Json<Value> {
    if mock.fail_process {
        return Json(json!({ "success": false, "error": "model crashed" }));
    }
    Json(json!({
        "success": true,
        "result": {
            "result_path": format!("/srv/results/{id}.png"),
            "result_url": format!("/results/{id}.png"),
            "processing_time": 1.25,
            "quality_score": 0.87
        }
    }))
}

async fn result_file(Path(_file): Path<String>) -> Bytes {
    Bytes::from_static(RESULT)
}

async fn spawn_mock(mock: Arc<MockModel>) -> String {
    let app = Router::new()
        .route("/health", get(health))
        .route("/tryon", post(submit))
        .route("/tryon/{id}/process", post(process))
        .route("/results/{file}", get(result_file))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn request(overlay: bool) -> InferenceRequest {
    InferenceRequest {
        job_id: JobId::new(),
        subject: Bytes::from_static(SUBJECT),
        overlay: overlay.then(|| Bytes::from_static(GARMENT)),
    }
}

#[tokio::test]
async fn full_round_trip_against_mock_service() {
    let mock = Arc::new(MockModel::default());
    let base = spawn_mock(mock.clone()).await;
    let engine = RemoteEngine::new(&base, Duration::from_secs(5)).unwrap();

    assert!(!engine.is_ready());
    engine.warm_up().await.expect("warm up");
    assert!(engine.is_ready());

    let output = engine.infer(request(true)).await.expect("infer");
    assert_eq!(output.artifact.as_ref(), RESULT);
    assert_eq!(output.metrics.engine_time_ms, Some(1250));
    assert_eq!(output.metrics.quality_score, Some(0.87));
    assert_eq!(output.metrics.details["remote_job_id"], "remote-0");

    let fields = mock.fields.lock().await.clone();
    assert_eq!(
        fields,
        vec![
            ("image".to_string(), "image/png".to_string(), SUBJECT.len()),
            ("garment".to_string(), "image/jpeg".to_string(), GARMENT.len()),
        ]
    );
}

#[tokio::test]
async fn overlay_is_optional() {
    let mock = Arc::new(MockModel::default());
    let base = spawn_mock(mock.clone()).await;
    let engine = RemoteEngine::new(&base, Duration::from_secs(5)).unwrap();

    engine.infer(request(false)).await.expect("infer");
    let fields = mock.fields.lock().await.clone();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].0, "image");
}

#[tokio::test]
async fn oversized_artifact_is_refused() {
    let mock = Arc::new(MockModel::default());
    let base = spawn_mock(mock).await;

    let tight = RemoteEngine::new(&base, Duration::from_secs(5))
        .unwrap()
        .with_max_artifact_bytes(RESULT.len() - 1);
    let err = tight.infer(request(false)).await.unwrap_err();
    match err {
        InferenceError::Backend(msg) => assert!(msg.contains("larger than"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }

    let exact = RemoteEngine::new(&base, Duration::from_secs(5))
        .unwrap()
        .with_max_artifact_bytes(RESULT.len());
    let output = exact.infer(request(false)).await.expect("infer at the limit");
    assert_eq!(output.artifact.as_ref(), RESULT);
}

#[tokio::test]
async fn remote_failure_is_a_backend_error() {
    let mock = Arc::new(MockModel {
        fail_process: true,
        ..Default::default()
    });
    let base = spawn_mock(mock).await;
    let engine = RemoteEngine::new(&base, Duration::from_secs(5)).unwrap();

    let err = engine.infer(request(true)).await.unwrap_err();
    assert!(matches!(err, InferenceError::Backend(msg) if msg == "model crashed"));
}

#[tokio::test]
async fn error_status_surfaces_message() {
    let app = Router::new().route(
        "/tryon",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "no image provided" })),
            )
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let engine = RemoteEngine::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    let err = engine.infer(request(false)).await.unwrap_err();
    match err {
        InferenceError::Backend(msg) => {
            assert!(msg.contains("400"), "{msg}");
            assert!(msg.contains("no image provided"), "{msg}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_service_is_not_ready() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let engine = RemoteEngine::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    assert!(engine.warm_up().await.is_err());
    assert!(!engine.is_ready());
    assert!(matches!(
        engine.infer(request(false)).await,
        Err(InferenceError::Backend(_))
    ));
}
