use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;

use handtally_core::annotation::infrastructure::cpu_skeleton_renderer::CpuSkeletonRenderer;
use handtally_core::codec::domain::image_encoder::ImageEncoder;
use handtally_core::codec::infrastructure::compressed_image_encoder::{
    CompressedImageEncoder, OutputFormat,
};
use handtally_core::codec::infrastructure::magic_byte_decoder::MagicByteDecoder;
use handtally_core::detection::domain::hand_detector::HandDetector;
use handtally_core::detection::infrastructure::onnx_hand_landmarker::OnnxHandLandmarker;
use handtally_core::detection::infrastructure::onnx_palm_detector::OnnxPalmDetector;
use handtally_core::detection::infrastructure::tracking_hand_detector::TrackingHandDetector;
use handtally_core::pipeline::pipeline_logger::LogPipelineLogger;
use handtally_core::pipeline::recognize_use_case::RecognizeUseCase;
use handtally_core::shared::constants::{
    LANDMARK_MODEL_NAME, LANDMARK_MODEL_URL, PALM_MODEL_NAME, PALM_MODEL_URL,
};
use handtally_core::shared::model_resolver;

use handtally_server::routes::create_app;
use handtally_server::state::AppState;

/// Finger counting server: detects hands in uploaded webcam frames and
/// reports how many fingers each one holds up.
#[derive(Parser)]
#[command(name = "handtally")]
struct Cli {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port.
    #[arg(long, default_value = "8002")]
    port: u16,

    /// Directory with the browser front-end.
    #[arg(long, default_value = "web")]
    static_dir: PathBuf,

    /// Maximum hands tracked per frame.
    #[arg(long, default_value = "2")]
    max_hands: usize,

    /// Palm detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.7")]
    detection_confidence: f32,

    /// Hand presence threshold for reusing tracked regions (0.0-1.0).
    #[arg(long, default_value = "0.7")]
    tracking_confidence: f32,

    /// Response image format: jpeg or png.
    #[arg(long, default_value = "jpeg")]
    format: String,

    /// JPEG quality (1-100).
    #[arg(long, default_value = "80")]
    jpeg_quality: u8,

    /// Artificial processing delay in milliseconds, for exercising client
    /// loading states.
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Directory with pre-fetched ONNX models (skips downloads).
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    if !cli.static_dir.exists() {
        log::warn!(
            "Static directory {} not found; only the API will be served",
            cli.static_dir.display()
        );
    }

    // Model downloads use blocking I/O; finish them before the runtime starts
    let detector = build_detector(&cli)?;
    let pipeline = RecognizeUseCase::new(
        Box::new(MagicByteDecoder),
        detector,
        Box::new(CpuSkeletonRenderer),
        build_encoder(&cli),
        Box::new(LogPipelineLogger::new()),
    );
    let state = AppState::new(pipeline, Duration::from_millis(cli.delay_ms));

    serve(&cli, state)
}

#[tokio::main]
async fn serve(cli: &Cli, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_app(state.clone(), &cli.static_dir);
    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state
        .pipeline
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .log_summary();
    Ok(())
}

fn build_detector(cli: &Cli) -> Result<Box<dyn HandDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {PALM_MODEL_NAME}");
    let palm_path = model_resolver::resolve(
        PALM_MODEL_NAME,
        PALM_MODEL_URL,
        cli.model_dir.as_deref(),
        Some(Box::new(download_progress)),
    )?;
    eprintln!();

    log::info!("Resolving model: {LANDMARK_MODEL_NAME}");
    let landmark_path = model_resolver::resolve(
        LANDMARK_MODEL_NAME,
        LANDMARK_MODEL_URL,
        cli.model_dir.as_deref(),
        Some(Box::new(download_progress)),
    )?;
    eprintln!();

    let palm = OnnxPalmDetector::new(&palm_path, cli.detection_confidence)
        .map_err(|e| e as Box<dyn std::error::Error>)?;
    let landmarker =
        OnnxHandLandmarker::new(&landmark_path).map_err(|e| e as Box<dyn std::error::Error>)?;
    Ok(Box::new(TrackingHandDetector::new(
        Box::new(palm),
        Box::new(landmarker),
        cli.max_hands,
        cli.tracking_confidence,
    )))
}

fn build_encoder(cli: &Cli) -> Box<dyn ImageEncoder> {
    let format = if cli.format == "png" {
        OutputFormat::Png
    } else {
        OutputFormat::Jpeg {
            quality: cli.jpeg_quality,
        }
    };
    Box::new(CompressedImageEncoder::new(format))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.max_hands == 0 {
        return Err("Max hands must be at least 1".into());
    }
    if !(0.0..=1.0).contains(&cli.detection_confidence) {
        return Err(format!(
            "Detection confidence must be between 0.0 and 1.0, got {}",
            cli.detection_confidence
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.tracking_confidence) {
        return Err(format!(
            "Tracking confidence must be between 0.0 and 1.0, got {}",
            cli.tracking_confidence
        )
        .into());
    }
    if cli.format != "jpeg" && cli.format != "png" {
        return Err(format!("Format must be 'jpeg' or 'png', got '{}'", cli.format).into());
    }
    if cli.jpeg_quality == 0 || cli.jpeg_quality > 100 {
        return Err(format!(
            "JPEG quality must be between 1 and 100, got {}",
            cli.jpeg_quality
        )
        .into());
    }
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down");
        },
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading hand model... {pct}%");
    } else {
        eprint!("\rDownloading hand model... {downloaded} bytes");
    }
}
