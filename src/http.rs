//! Axum adaptation layer.
//!
//! Everything here is glue between the wire and the synchronous pipelines:
//! multipart fields are buffered into [`FilePart`]s (axum's `Multipart` is
//! the wire-format parser; this crate only consumes parsed parts), JSON
//! bodies are collected under the configured ceiling, and results flow back
//! out through the `{error, message, data?}` envelope.
//!
//! The aggregate upload ceiling is enforced here, while the raw body is
//! being buffered, before the pipeline inspects a single part.

use std::error::Error as StdError;
use std::fmt;
use std::path::Path;

use axum::body::Body;
use axum::extract::multipart::Multipart;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::IntakeConfig;
use crate::error::{JsonError, UploadError};
use crate::upload::{self, FilePart, NamePolicy, UploadOutcome, UploadRecord};

/// Wire envelope for JSON responses.
///
/// `data` is omitted from the serialized form when absent.
///
/// ```
/// use intake::http::Envelope;
///
/// let body = serde_json::to_string(&Envelope::failure("bad input")).unwrap();
/// assert_eq!(body, r#"{"error":true,"message":"bad input"}"#);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    /// Whether the response reports a failure.
    pub error: bool,
    /// Human-readable summary.
    pub message: String,
    /// Optional payload; absent from the wire when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Success envelope carrying a payload.
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl Envelope {
    /// Failure envelope with no payload.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Buffers a multipart request's file parts and runs them through
/// [`save_parts`](crate::save_parts).
///
/// Non-file fields are skipped. The effective `max_upload_bytes` ceiling is
/// applied to the buffered field bytes as they arrive; exceeding it aborts
/// with [`UploadError::BodyTooLarge`] and zero records.
pub async fn upload_many(
    multipart: Multipart,
    dest_dir: &Path,
    config: &IntakeConfig,
    policy: NamePolicy,
) -> UploadOutcome {
    let limit = config.limits().max_upload_bytes;
    match collect_parts(multipart, limit).await {
        Ok(parts) => upload::save_parts(parts, dest_dir, config, policy),
        Err(error) => UploadOutcome {
            records: Vec::new(),
            error: Some(error),
        },
    }
}

/// Single-file variant of [`upload_many`]; requires exactly one file part.
pub async fn upload_one(
    multipart: Multipart,
    dest_dir: &Path,
    config: &IntakeConfig,
    policy: NamePolicy,
) -> Result<UploadRecord, UploadError> {
    let limit = config.limits().max_upload_bytes;
    let parts = collect_parts(multipart, limit).await?;
    upload::save_one(parts, dest_dir, config, policy)
}

async fn collect_parts(
    mut multipart: Multipart,
    limit: u64,
) -> Result<Vec<FilePart>, UploadError> {
    let mut parts = Vec::new();
    let mut total: u64 = 0;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|err| UploadError::ReadPart {
                name: "multipart body".to_string(),
                source: std::io::Error::other(err),
            })?;
        let Some(field) = field else { break };

        // Only file fields feed the pipeline.
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };

        let bytes = field.bytes().await.map_err(|err| UploadError::ReadPart {
            name: file_name.clone(),
            source: std::io::Error::other(err),
        })?;

        total = total.saturating_add(bytes.len() as u64);
        if total > limit {
            return Err(UploadError::BodyTooLarge { limit });
        }

        parts.push(FilePart::from_bytes(file_name, bytes.to_vec()));
    }

    Ok(parts)
}

/// Decodes a request body as one JSON document into `T`.
///
/// Collects the body under the effective `max_json_bytes` ceiling, then
/// hands the bytes to [`read_json`](crate::read_json); an over-long body
/// surfaces as [`JsonError::TooLarge`] without buffering the remainder.
pub async fn read_json<T: DeserializeOwned>(
    body: Body,
    config: &IntakeConfig,
) -> Result<T, JsonError> {
    let limit = config.limits().max_json_bytes;
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|err| map_body_error(err, limit))?;
    crate::json::read_json(&bytes, config)
}

fn map_body_error(err: axum::Error, limit: usize) -> JsonError {
    let mut source: Option<&(dyn StdError + 'static)> = Some(&err);
    while let Some(current) = source {
        if current.is::<http_body_util::LengthLimitError>() {
            return JsonError::TooLarge { limit };
        }
        source = current.source();
    }
    JsonError::Other(err.to_string())
}

/// Serializes `payload` as the JSON body of a response.
///
/// Extra headers are applied first; the JSON content type always wins.
pub fn write_json<T: Serialize>(
    status: StatusCode,
    payload: &T,
    extra_headers: Option<HeaderMap>,
) -> Result<Response, JsonError> {
    let body = serde_json::to_vec(payload).map_err(|err| JsonError::Other(err.to_string()))?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Some(extra) = extra_headers {
        response.headers_mut().extend(extra);
    }
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

/// Wraps any displayable error in a failure [`Envelope`] and emits it via
/// [`write_json`]. The status defaults to 400 Bad Request.
///
/// Pipeline errors carry their own status suggestions
/// ([`UploadError::http_status`], [`JsonError::http_status`]) that callers
/// can pass through here.
pub fn error_json(err: &dyn fmt::Display, status: Option<StatusCode>) -> Response {
    let status = status.unwrap_or(StatusCode::BAD_REQUEST);
    let envelope = Envelope::failure(err.to_string());
    match write_json(status, &envelope, None) {
        Ok(response) => response,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Streams a stored file as a forced download.
///
/// The `Content-Disposition: attachment` header carries `display_name`, so
/// browsers save the file instead of rendering it inline; the body is the
/// stored file's exact bytes with their sniffed content type and length.
pub async fn download_attachment(
    dir: &Path,
    stored_name: &str,
    display_name: &str,
) -> Result<Response, std::io::Error> {
    let bytes = tokio::fs::read(dir.join(stored_name)).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{display_name}\""))
        .map_err(std::io::Error::other)?;
    let content_type = HeaderValue::from_static(upload::sniff_bytes(&bytes));
    let length = bytes.len();

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[test]
    fn envelope_omits_absent_data() {
        let wire = serde_json::to_value(Envelope::failure("nope")).unwrap();
        assert_eq!(wire, serde_json::json!({"error": true, "message": "nope"}));

        let wire = serde_json::to_value(Envelope::success("ok", 7)).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({"error": false, "message": "ok", "data": 7})
        );
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let payload = Sample {
            name: "fixture".into(),
            count: 3,
        };

        let response = write_json(StatusCode::OK, &payload, None).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            HeaderValue::from_static("application/json")
        );

        let bytes = body_bytes(response).await;
        let back: Sample = crate::json::read_json(&bytes, &IntakeConfig::default()).unwrap();
        assert_eq!(back, payload);
    }

    #[tokio::test]
    async fn extra_headers_cannot_clobber_content_type() {
        let mut extra = HeaderMap::new();
        extra.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        extra.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        );

        let response = write_json(StatusCode::CREATED, &serde_json::json!({}), Some(extra)).unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            HeaderValue::from_static("application/json")
        );
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            HeaderValue::from_static("no-store")
        );
    }

    #[tokio::test]
    async fn error_json_wraps_pipeline_errors() {
        let err = JsonError::EmptyBody;
        let response = error_json(
            &err,
            Some(StatusCode::from_u16(err.http_status()).unwrap()),
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = body_bytes(response).await;
        let envelope: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert!(envelope.error);
        assert_eq!(envelope.message, "body must not be empty");
        assert!(envelope.data.is_none());
    }

    #[tokio::test]
    async fn error_json_defaults_to_bad_request() {
        let response = error_json(&"anything", None);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn body_read_json_honours_the_ceiling() {
        let config = IntakeConfig {
            max_json_bytes: Some(5),
            ..Default::default()
        };

        let err = read_json::<Sample>(Body::from(r#"{"name":"x","count":1}"#), &config)
            .await
            .unwrap_err();
        assert_eq!(err, JsonError::TooLarge { limit: 5 });

        let value: serde_json::Value = read_json(Body::from("true"), &config).await.unwrap();
        assert_eq!(value, serde_json::json!(true));
    }

    #[tokio::test]
    async fn download_sets_attachment_headers_and_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let stored = "aGVsbG8.png";
        let content = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];
        std::fs::write(dir.path().join(stored), content).unwrap();

        let response = download_attachment(dir.path(), stored, "picture.png")
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            HeaderValue::from_static("attachment; filename=\"picture.png\"")
        );
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            HeaderValue::from_static("image/png")
        );
        assert_eq!(
            response.headers()[header::CONTENT_LENGTH],
            HeaderValue::from(content.len())
        );
        assert_eq!(body_bytes(response).await, content);
    }

    #[tokio::test]
    async fn download_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_attachment(dir.path(), "ghost.bin", "ghost.bin")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
