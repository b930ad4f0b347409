//! Request handlers.
//!
//! Inference runs synchronously on the handler task; each request is
//! independent and the loaded artifacts are read-only, so no locking
//! discipline exists beyond the per-session mutexes.

use axum::extract::{Form, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::ServiceContext;
use crate::embed::combined_query;
use crate::preprocess;

/// Request-time failure, translated into a client response instead of
/// crashing the handling task.
#[derive(Debug)]
pub enum ApiError {
    /// The upload could not be decoded as an image.
    BadImage(String),
    /// A required multipart/form field was absent.
    MissingField(&'static str),
    /// Inference or index failure.
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadImage(reason) => {
                tracing::warn!(reason = %reason, "Rejected undecodable image upload");
                (
                    StatusCode::BAD_REQUEST,
                    format!("could not decode image: {}", reason),
                )
            }
            ApiError::MissingField(field) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("missing required field: {}", field),
            ),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FeatureResponse {
    pub features: Vec<f32>,
}

#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    pub similar_index: Vec<Vec<usize>>,
}

#[derive(Debug, Deserialize)]
pub struct TextForm {
    pub text: String,
}

/// `GET /healthcheck`
pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "API is up and running!",
    })
}

/// `POST /predict/feature_embedding/image` with multipart field `image`.
pub async fn predict_image(
    State(context): State<Arc<ServiceContext>>,
    multipart: Multipart,
) -> Result<Json<FeatureResponse>, ApiError> {
    let bytes = read_image_field(multipart).await?;
    let features = embed_image_bytes(&context, &bytes)?;
    Ok(Json(FeatureResponse { features }))
}

/// `POST /predict/feature_embedding/text` with form field `text`.
pub async fn predict_text(
    State(context): State<Arc<ServiceContext>>,
    Form(form): Form<TextForm>,
) -> Result<Json<FeatureResponse>, ApiError> {
    let features = context.text_encoder.embed(&form.text)?;
    Ok(Json(FeatureResponse { features }))
}

/// `POST /predict/similar_images` with multipart `image` and `text` fields.
///
/// Runs both extractors, concatenates image-then-text into the combined
/// query, and asks the index for the configured number of neighbours
/// (one query per call, so the response is a single row).
pub async fn predict_similar(
    State(context): State<Arc<ServiceContext>>,
    mut multipart: Multipart,
) -> Result<Json<SimilarResponse>, ApiError> {
    let mut image_bytes = None;
    let mut text = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Multipart read failed: {}", e)))?
    {
        match field.name() {
            Some("image") => {
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::Internal(anyhow::anyhow!("Multipart read failed: {}", e))
                })?;
                image_bytes = Some(bytes);
            }
            Some("text") => {
                let value = field.text().await.map_err(|e| {
                    ApiError::Internal(anyhow::anyhow!("Multipart read failed: {}", e))
                })?;
                text = Some(value);
            }
            _ => {}
        }
    }

    let image_bytes = image_bytes.ok_or(ApiError::MissingField("image"))?;
    let text = text.ok_or(ApiError::MissingField("text"))?;

    let image_embedding = embed_image_bytes(&context, &image_bytes)?;
    let text_embedding = context.text_encoder.embed(&text)?;

    let query = combined_query(&image_embedding, &text_embedding);

    let similar_index = context
        .index
        .search(&[query], context.config.index.neighbors);

    Ok(Json(SimilarResponse { similar_index }))
}

/// Pull the `image` field out of a multipart body.
async fn read_image_field(mut multipart: Multipart) -> Result<axum::body::Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Multipart read failed: {}", e)))?
    {
        if field.name() == Some("image") {
            return field.bytes().await.map_err(|e| {
                ApiError::Internal(anyhow::anyhow!("Multipart read failed: {}", e))
            });
        }
    }

    Err(ApiError::MissingField("image"))
}

/// Decode an uploaded image, rejecting undecodable bytes as a client error.
fn decode_image(bytes: &[u8]) -> Result<image::DynamicImage, ApiError> {
    image::load_from_memory(bytes).map_err(|e| ApiError::BadImage(e.to_string()))
}

/// Decode, preprocess, and embed an uploaded image.
fn embed_image_bytes(context: &ServiceContext, bytes: &[u8]) -> Result<Vec<f32>, ApiError> {
    let img = decode_image(bytes)?;
    let tensor = preprocess::process_image(&img, context.config.models.image_size);
    Ok(context.image_encoder.embed(tensor)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_healthcheck_literal_message() {
        let response = healthcheck().await;
        assert_eq!(response.0.message, "API is up and running!");
    }

    #[test]
    fn test_health_response_json_shape() {
        let body = serde_json::to_value(HealthResponse {
            message: "API is up and running!",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"message": "API is up and running!"}));
    }

    #[test]
    fn test_similar_response_is_single_row() {
        let body = serde_json::to_value(SimilarResponse {
            similar_index: vec![vec![4, 0, 9]],
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"similar_index": [[4, 0, 9]]}));
    }

    #[test]
    fn test_feature_response_json_shape() {
        let body = serde_json::to_value(FeatureResponse {
            features: vec![0.5, -1.0],
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"features": [0.5, -1.0]}));
    }

    async fn error_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_bad_image_maps_to_400() {
        let response = ApiError::BadImage("unsupported format".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = error_body(response).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("could not decode image"));
        assert!(message.contains("unsupported format"));
    }

    #[tokio::test]
    async fn test_missing_field_maps_to_422() {
        let response = ApiError::MissingField("text").into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = error_body(response).await;
        assert_eq!(body["error"], "missing required field: text");
    }

    #[tokio::test]
    async fn test_internal_error_maps_to_500_without_detail() {
        let response =
            ApiError::Internal(anyhow::anyhow!("session poisoned")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // Internal diagnostics go to the log, not the client.
        let body = error_body(response).await;
        assert_eq!(body["error"], "internal error");
    }

    #[tokio::test]
    async fn test_garbage_image_upload_is_rejected_as_client_error() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ApiError::BadImage(_)));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
