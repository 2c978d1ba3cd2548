//! End-to-end tests for `POST /generate-3d`.

use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::Value;

mod common;
use common::{Behavior, FakeGenerator};

#[tokio::test]
async fn returns_glb_attachment_and_cleans_up() {
    let generator = FakeGenerator::new(Behavior::Succeed);
    let gw = common::spawn_gateway(generator.clone()).await;

    let res = common::client()
        .post(gw.url("/generate-3d"))
        .multipart(common::image_form("image", "cat.png", vec![1, 2, 3, 4]))
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "model/gltf-binary");
    assert!(res.headers().contains_key("x-request-id"));
    let disposition = res.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"model_"));
    assert!(disposition.ends_with(".glb\""));

    let body = res.bytes().await.unwrap();
    assert_eq!(body.as_ref(), common::glb_bytes().as_slice());
    assert_eq!(generator.runs.load(Ordering::SeqCst), 1);

    let left = common::wait_for_cleanup(gw.temp_path()).await;
    assert!(left.is_empty(), "temp files left behind: {left:?}");
}

#[tokio::test]
async fn rejects_unsupported_format_without_running_pipeline() {
    let generator = FakeGenerator::new(Behavior::Succeed);
    let gw = common::spawn_gateway(generator.clone()).await;

    let res = common::client()
        .post(gw.url("/generate-3d"))
        .multipart(common::image_form("image", "anim.gif", vec![0; 16]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["detail"],
        "Unsupported format. Supported: jpg, jpeg, png, webp, bmp"
    );
    assert_eq!(generator.runs.load(Ordering::SeqCst), 0);
    assert!(common::managed_files(gw.temp_path()).is_empty());
}

#[tokio::test]
async fn rejects_oversized_upload() {
    let generator = FakeGenerator::new(Behavior::Succeed);
    let gw = common::spawn_gateway_with(generator.clone(), |c| c.upload.max_bytes = 1024).await;

    let res = common::client()
        .post(gw.url("/generate-3d"))
        .multipart(common::image_form("image", "big.jpg", vec![7; 4096]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "File too large (max 1024 bytes)");
    assert_eq!(generator.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upload_at_exact_limit_is_accepted() {
    let gw = common::spawn_gateway_with(FakeGenerator::new(Behavior::Succeed), |c| {
        c.upload.max_bytes = 1024
    })
    .await;

    let res = common::client()
        .post(gw.url("/generate-3d"))
        .multipart(common::image_form("image", "edge.png", vec![7; 1024]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn photo_beyond_body_limit_gets_the_same_size_error() {
    let generator = FakeGenerator::new(Behavior::Succeed);
    let gw = common::spawn_gateway(generator.clone()).await;

    let res = common::client()
        .post(gw.url("/generate-3d"))
        .multipart(common::image_form("image", "photo.jpg", vec![9; 12 * 1024 * 1024]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "File too large (max 10MB)");
    assert_eq!(generator.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_image_field_is_unprocessable() {
    let gw = common::spawn_gateway(FakeGenerator::new(Behavior::Succeed)).await;

    let res = common::client()
        .post(gw.url("/generate-3d"))
        .multipart(common::image_form("picture", "cat.png", vec![1]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 422);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Missing required form field 'image'");
}

#[tokio::test]
async fn generation_failure_is_reported_and_cleaned_up() {
    let gw = common::spawn_gateway(FakeGenerator::new(Behavior::FailGenerate)).await;

    let res = common::client()
        .post(gw.url("/generate-3d"))
        .multipart(common::image_form("image", "cat.jpg", vec![1, 2, 3]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("CUDA out of memory"), "detail: {detail}");

    let left = common::wait_for_cleanup(gw.temp_path()).await;
    assert!(left.is_empty(), "temp files left behind: {left:?}");
}

#[tokio::test]
async fn load_failure_is_retried_on_next_request() {
    let generator = FakeGenerator::new(Behavior::FailLoad);
    let gw = common::spawn_gateway(generator.clone()).await;
    let client = common::client();

    for _ in 0..2 {
        let res = client
            .post(gw.url("/generate-3d"))
            .multipart(common::image_form("image", "cat.webp", vec![1]))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 500);
        let body: Value = res.json().await.unwrap();
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Failed to load model:"));
    }

    assert_eq!(generator.loads.load(Ordering::SeqCst), 2);
    assert_eq!(generator.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_glb_output_is_not_served() {
    let gw = common::spawn_gateway(FakeGenerator::new(Behavior::WriteGarbage)).await;

    let res = common::client()
        .post(gw.url("/generate-3d"))
        .multipart(common::image_form("image", "cat.bmp", vec![1]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("not a valid GLB"));

    let left = common::wait_for_cleanup(gw.temp_path()).await;
    assert!(left.is_empty(), "temp files left behind: {left:?}");
}

#[tokio::test]
async fn busy_pipeline_returns_503_with_retry_after() {
    let generator = FakeGenerator::new(Behavior::Slow(Duration::from_millis(800)));
    let gw = common::spawn_gateway_with(generator.clone(), |c| {
        c.pipeline.max_concurrent_jobs = 1;
        c.pipeline.queue_timeout_ms = 100;
    })
    .await;
    let client = common::client();

    let first = {
        let client = client.clone();
        let url = gw.url("/generate-3d");
        tokio::spawn(async move {
            client
                .post(url)
                .multipart(common::image_form("image", "a.png", vec![1]))
                .send()
                .await
                .unwrap()
                .status()
        })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let second = client
        .post(gw.url("/generate-3d"))
        .multipart(common::image_form("image", "b.png", vec![2]))
        .send()
        .await
        .unwrap();

    assert_eq!(second.status(), 503);
    assert_eq!(second.headers()["retry-after"], "30");
    assert_eq!(first.await.unwrap(), 200);
    assert_eq!(generator.runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_leaving_mid_download_still_cleans_up() {
    let gw = common::spawn_gateway(FakeGenerator::new(Behavior::Large(32 * 1024 * 1024))).await;

    let mut res = common::client()
        .post(gw.url("/generate-3d"))
        .multipart(common::image_form("image", "cat.png", vec![1, 2, 3]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let first = res.chunk().await.unwrap().expect("body should start streaming");
    assert!(!first.is_empty());
    assert!(
        !common::managed_files(gw.temp_path()).is_empty(),
        "files must outlive an unfinished download"
    );

    drop(res);

    let left = common::wait_for_cleanup(gw.temp_path()).await;
    assert!(left.is_empty(), "temp files left behind: {left:?}");
}
