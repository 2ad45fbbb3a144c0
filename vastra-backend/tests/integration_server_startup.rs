use std::io::Cursor;
use std::net::Ipv4Addr;
use std::sync::Arc;

use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::{json, Value};
use vastra_backend::build_router;
use vastra_backend::state::AppState;
use vastra_blobs::FsBlobStore;
use vastra_engines::CompositeEngine;
use vastra_job_queue::JobManager;

#[tokio::test]
async fn server_with_filesystem_blobs_serves_a_job() {
    let cfg = vastra_config::Config::default();
    let blob_dir = tempfile::tempdir().expect("tempdir");

    let jobs = JobManager::new(
        Arc::new(FsBlobStore::new(blob_dir.path())),
        Arc::new(CompositeEngine::new()),
        vastra_job_queue::ManagerOptions {
            max_image_bytes: cfg.uploads.max_image_bytes,
            ..Default::default()
        },
    );
    let state = AppState::new(jobs, cfg.jobs.mode);
    let router = build_router(state.into());

    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });

    let base = format!("http://{}:{}/api", addr.ip(), addr.port());
    let client = reqwest::Client::new();

    let res = client.get(format!("{base}/health")).send().await.expect("health");
    assert!(res.status().is_success());
    let health: Value = res.json().await.unwrap();
    assert_eq!(health["blobStore"], "filesystem");

    let mut subject = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([1, 2, 3, 255])))
        .write_to(&mut subject, ImageFormat::Png)
        .unwrap();
    let encoded = base64::engine::general_purpose::STANDARD.encode(subject.into_inner());

    let created: Value = client
        .post(format!("{base}/try-on/jobs"))
        .json(&json!({ "subject": encoded }))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().expect("id");

    let processed = client
        .post(format!("{base}/try-on/jobs/{id}/process"))
        .send()
        .await
        .expect("process");
    assert_eq!(processed.status(), reqwest::StatusCode::OK);
    let job: Value = processed.json().await.unwrap();
    assert_eq!(job["status"], "completed");

    let artifact = client
        .get(format!("{base}/try-on/jobs/{id}/result"))
        .send()
        .await
        .expect("result");
    assert_eq!(
        artifact
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("image/png")
    );
    let bytes = artifact.bytes().await.unwrap();
    assert!(!bytes.is_empty());

    // The artifact is sharded on disk by handle prefix.
    let handle = job["result"]["artifactHandle"].as_str().unwrap();
    assert!(blob_dir.path().join(&handle[..2]).join(handle).is_file());

    server.abort();
}
