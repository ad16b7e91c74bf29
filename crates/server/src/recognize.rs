use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use handtally_core::pipeline::recognize_use_case::Recognition;

use crate::state::AppState;

/// Response envelope for `POST /recognize`.
///
/// Failures travel in-band as `{"error": ...}` with HTTP 200: browser
/// clients read one response shape and branch on the `error` key, and
/// this is the only place pipeline errors are mapped onto the wire.
#[derive(Serialize)]
#[serde(untagged)]
pub enum RecognizeResponse {
    Success(RecognizePayload),
    Failure { error: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizePayload {
    /// Mirrored, annotated frame as a `data:` URI.
    pub image_data: String,
    /// One entry per detected hand.
    pub hand_data: Vec<HandEntry>,
}

#[derive(Serialize)]
pub struct HandEntry {
    pub label: &'static str,
    pub digit: String,
}

impl From<Recognition> for RecognizePayload {
    fn from(recognition: Recognition) -> Self {
        Self {
            image_data: recognition.image_data,
            hand_data: recognition
                .hands
                .into_iter()
                .map(|hand| HandEntry {
                    label: hand.handedness.label(),
                    digit: hand.digit,
                })
                .collect(),
        }
    }
}

/// Handle one uploaded frame: run the recognition pipeline on a blocking
/// worker and return the annotated image plus per-hand finger counts.
pub async fn recognize_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Json<RecognizeResponse> {
    let bytes = match read_upload(&mut multipart).await {
        Ok(bytes) => bytes,
        Err(message) => {
            log::warn!("Rejected upload: {message}");
            return Json(RecognizeResponse::Failure { error: message });
        }
    };

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::task::spawn_blocking(move || {
        // Recover from a poisoned lock: a panic mid-request can at worst
        // leave stale tracked regions, which the next detect clears out
        let mut pipeline = pipeline
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        pipeline.execute(&bytes)
    })
    .await;

    let response = match result {
        Ok(Ok(recognition)) => RecognizeResponse::Success(recognition.into()),
        Ok(Err(err)) => {
            log::warn!("Recognition failed: {err}");
            RecognizeResponse::Failure {
                error: err.to_string(),
            }
        }
        Err(err) => {
            log::error!("Recognition task panicked: {err}");
            RecognizeResponse::Failure {
                error: "internal processing failure".to_string(),
            }
        }
    };

    Json(response)
}

/// Pull the uploaded image out of the multipart body.
///
/// The bundled front-end posts the frame under a field named `file`, but
/// any field carrying a filename is accepted so curl one-liners work too.
async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("malformed multipart body: {e}"))?
    {
        if field.file_name().is_none() && field.name() != Some("file") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| format!("failed to read upload: {e}"))?;
        return Ok(bytes.to_vec());
    }
    Err("no file field in upload".to_string())
}
