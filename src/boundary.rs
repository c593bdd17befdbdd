//! Translation between the transport format and the pipeline's types.
//!
//! Inbound: a `multipart/form-data` body with any number of file parts named
//! `files` and an optional text part named `quality`.
//!
//! Outbound: a JSON [`ConvertResponse`] with base64 payloads, or an
//! [`ErrorResponse`] plus the status code to send it with.
//!
//! ```json
//! {
//!   "success": true,
//!   "quality": 80,
//!   "files": [{"name": "a.webp", "original_name": "a.png", "data": "UklGR...",
//!              "original_size": 10240, "compressed_size": 4096, "reduction": 60}],
//!   "failures": [{"name": "b.jpg", "reason": "decode error"}],
//!   "archive": "UEsDB...",
//!   "archive_name": "converted-images.zip"
//! }
//! ```
//!
//! This is the only module that knows about multipart, JSON or base64.

use crate::codec::Quality;
use crate::convert::ConvertError;
use crate::types::{ConversionRequest, ConversionResult, InputItem};
use axum::http::StatusCode;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures_util::stream;
use serde::Serialize;
use thiserror::Error;

/// Form field carrying the uploads.
pub const FILES_FIELD: &str = "files";
/// Form field carrying the quality.
pub const QUALITY_FIELD: &str = "quality";

/// Message sent for any failure the caller cannot fix.
const INTERNAL_ERROR_MESSAGE: &str = "Failed to convert images";

#[derive(Error, Debug)]
pub enum BoundaryError {
    #[error("Malformed multipart payload: {0}")]
    Malformed(#[from] multer::Error),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("Conversion task failed: {0}")]
    Task(String),
}

impl BoundaryError {
    /// HTTP status and caller-facing message. Internal detail never leaks.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Malformed(_) => (
                StatusCode::BAD_REQUEST,
                "Malformed multipart payload".to_string(),
            ),
            Self::Convert(err) if err.is_client_error() => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            Self::Convert(_) | Self::Task(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_MESSAGE.to_string(),
            ),
        }
    }

    pub fn to_response(&self) -> (StatusCode, ErrorResponse) {
        let (status, error) = self.status_and_message();
        (status, ErrorResponse { error })
    }
}

/// Parse the `quality` field.
///
/// Reads the leading integer (optional sign, then digits) and ignores the rest,
/// so `"72.5"` is 72. Absent text or text without leading digits yields
/// `default`; numbers outside 1–100 are clamped.
pub fn parse_quality(raw: Option<&str>, default: Quality) -> Quality {
    raw.and_then(leading_integer)
        .map(Quality::new)
        .unwrap_or(default)
}

fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    // Saturates on overflow; anything that large clamps anyway.
    let magnitude = rest[..digits]
        .bytes()
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse a multipart body into a [`ConversionRequest`].
///
/// `content_type` is the request's full `Content-Type` header (it carries the
/// boundary). Parts other than `files` and `quality` are ignored; a file part
/// without a content type is kept and later dropped as a non-image.
pub async fn parse_multipart(
    content_type: &str,
    body: Bytes,
    default_quality: Quality,
) -> Result<ConversionRequest, BoundaryError> {
    let boundary = multer::parse_boundary(content_type)?;
    let body = stream::once(async move { Ok::<Bytes, std::convert::Infallible>(body) });
    let mut multipart = multer::Multipart::new(body, boundary);

    let mut items = Vec::new();
    let mut quality_text: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some(FILES_FIELD) => {
                let name = field.file_name().unwrap_or_default().to_string();
                let mime_type = field
                    .content_type()
                    .map(|mime| mime.essence_str().to_string())
                    .unwrap_or_default();
                let bytes = field.bytes().await?;
                items.push(InputItem {
                    name,
                    mime_type,
                    bytes,
                });
            }
            Some(QUALITY_FIELD) if quality_text.is_none() => {
                quality_text = Some(field.text().await?);
            }
            _ => {}
        }
    }

    Ok(ConversionRequest {
        items,
        quality: parse_quality(quality_text.as_deref(), default_quality),
    })
}

/// One converted file in the response.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertedFile {
    pub name: String,
    pub original_name: String,
    /// Base64 (standard alphabet) of the WebP bytes.
    pub data: String,
    pub original_size: usize,
    pub compressed_size: usize,
    /// Percent saved, 0–100.
    pub reduction: u8,
}

/// One item that could not be converted.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub name: String,
    pub reason: String,
}

/// Successful response body.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub quality: u8,
    pub files: Vec<ConvertedFile>,
    pub failures: Vec<FailedFile>,
    /// Base64 of the ZIP archive. Omitted when nothing converted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_name: Option<String>,
}

/// Error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Build the response for a finished batch.
pub fn build_response(
    result: &ConversionResult,
    quality: Quality,
    archive_name: &str,
) -> ConvertResponse {
    let files = result
        .successes()
        .map(|item| ConvertedFile {
            name: item.output_name.clone(),
            original_name: item.original_name.clone(),
            data: STANDARD.encode(&item.output_bytes),
            original_size: item.original_size,
            compressed_size: item.compressed_size,
            reduction: item.reduction(),
        })
        .collect();

    let failures = result
        .failures()
        .map(|item| FailedFile {
            name: item.original_name.clone(),
            reason: item.reason.to_string(),
        })
        .collect();

    let archive = result.archive.as_ref().map(|bytes| STANDARD.encode(bytes));
    let archive_name = archive.as_ref().map(|_| archive_name.to_string());

    ConvertResponse {
        success: true,
        quality: quality.value(),
        files,
        failures,
        archive,
        archive_name,
    }
}
