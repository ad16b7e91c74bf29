use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use handtally_core::annotation::infrastructure::cpu_skeleton_renderer::CpuSkeletonRenderer;
use handtally_core::codec::infrastructure::compressed_image_encoder::{
    CompressedImageEncoder, OutputFormat,
};
use handtally_core::codec::infrastructure::magic_byte_decoder::MagicByteDecoder;
use handtally_core::detection::domain::hand_detector::HandDetector;
use handtally_core::detection::domain::hand_landmarks::{
    HandObservation, Handedness, Landmark, INDEX_FINGER_PIP, INDEX_FINGER_TIP, LANDMARK_COUNT,
    THUMB_IP, THUMB_TIP,
};
use handtally_core::pipeline::pipeline_logger::NullPipelineLogger;
use handtally_core::pipeline::recognize_use_case::RecognizeUseCase;
use handtally_core::shared::frame::Frame;
use handtally_server::routes::create_app;
use handtally_server::state::AppState;

const BOUNDARY: &str = "test-boundary-7d93b2";

// --- Fixtures ---

struct StubDetector {
    observations: Vec<HandObservation>,
}

impl HandDetector for StubDetector {
    fn detect(
        &mut self,
        _frame: &Frame,
    ) -> Result<Vec<HandObservation>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.observations.clone())
    }
}

/// Right hand with thumb and index extended, everything else folded.
fn two_finger_right_hand() -> HandObservation {
    let mut points = [Landmark::new(0.5, 0.5, 0.0); LANDMARK_COUNT];
    points[THUMB_TIP] = Landmark::new(0.30, 0.5, 0.0);
    points[THUMB_IP] = Landmark::new(0.35, 0.5, 0.0);
    points[INDEX_FINGER_TIP] = Landmark::new(0.5, 0.20, 0.0);
    points[INDEX_FINGER_PIP] = Landmark::new(0.5, 0.40, 0.0);
    HandObservation::new(Handedness::Right, points)
}

fn test_state(observations: Vec<HandObservation>) -> AppState {
    let pipeline = RecognizeUseCase::new(
        Box::new(MagicByteDecoder),
        Box::new(StubDetector { observations }),
        Box::new(CpuSkeletonRenderer),
        Box::new(CompressedImageEncoder::new(OutputFormat::Jpeg { quality: 80 })),
        Box::new(NullPipelineLogger),
    );
    AppState::new(pipeline, Duration::ZERO)
}

fn test_app(observations: Vec<HandObservation>) -> Router {
    create_app(test_state(observations), Path::new("web-missing-in-tests"))
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 40 % 256) as u8, (y * 40 % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    img.write_with_encoder(image::codecs::png::PngEncoder::new(&mut bytes))
        .unwrap();
    bytes
}

fn multipart_file_body(bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"frame.png\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn recognize_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/recognize")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_response(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// --- Tests ---

#[tokio::test]
async fn test_recognize_reports_label_and_digit_per_hand() {
    let app = test_app(vec![two_finger_right_hand()]);
    let request = recognize_request(multipart_file_body(&png_bytes(32, 24)));

    let (status, json) = json_response(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["handData"].as_array().unwrap().len(), 1);
    assert_eq!(json["handData"][0]["label"], "Right");
    assert_eq!(json["handData"][0]["digit"], "2");
    assert!(json["imageData"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn test_recognize_with_no_hands_returns_empty_list() {
    let app = test_app(vec![]);
    let request = recognize_request(multipart_file_body(&png_bytes(16, 16)));

    let (status, json) = json_response(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["handData"], serde_json::json!([]));
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_undecodable_upload_reports_error_in_band() {
    let app = test_app(vec![]);
    let request = recognize_request(multipart_file_body(b"definitely not an image"));

    let (status, json) = json_response(app, request).await;

    // Errors ride in the payload, never in the status code
    assert_eq!(status, StatusCode::OK);
    assert!(json["error"].as_str().unwrap().contains("unrecognized"));
    assert!(json.get("imageData").is_none());
}

#[tokio::test]
async fn test_upload_without_file_field_reports_error() {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"note\"\r\n\r\n");
    body.extend_from_slice(b"hello");
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let app = test_app(vec![]);
    let (status, json) = json_response(app, recognize_request(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["error"], "no file field in upload");
}

#[tokio::test]
async fn test_get_recognize_is_method_not_allowed() {
    let app = test_app(vec![]);
    let request = Request::builder()
        .method("GET")
        .uri("/recognize")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_annotated_image_keeps_upload_dimensions() {
    let app = test_app(vec![two_finger_right_hand()]);
    let request = recognize_request(multipart_file_body(&png_bytes(40, 30)));

    let (_, json) = json_response(app, request).await;

    let uri = json["imageData"].as_str().unwrap();
    let payload = uri.split_once("base64,").unwrap().1;
    let bytes = STANDARD.decode(payload).unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (40, 30));
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let app = test_app(vec![]);
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/recognize")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_path_serves_index_fallback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>handtally</html>").unwrap();
    let app = create_app(test_state(vec![]), dir.path());

    let request = Request::builder()
        .uri("/some/client/route")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(std::str::from_utf8(&bytes).unwrap().contains("handtally"));

    let request = Request::builder()
        .uri("/index.html")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
