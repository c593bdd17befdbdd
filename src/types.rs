//! Request-scoped data model shared by the orchestrator and the boundary.
//!
//! Everything here is created when a request arrives and dropped when its
//! response is written. Nothing is shared between requests.

use crate::codec::{FailureKind, Quality};
use bytes::Bytes;

/// Mime-types the codec can decode. Anything else is dropped before conversion.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/pjpeg",
    "image/webp",
];

/// Whether a declared mime-type names a raster format the codec decodes.
///
/// Case-insensitive; parameters after `;` are ignored.
pub fn is_supported_mime(mime_type: &str) -> bool {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    SUPPORTED_MIME_TYPES
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(essence))
}

/// One uploaded file. Immutable once captured.
#[derive(Debug, Clone)]
pub struct InputItem {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl InputItem {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_supported_image(&self) -> bool {
        is_supported_mime(&self.mime_type)
    }
}

/// A batch to convert: ordered uploads plus one shared quality.
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    pub items: Vec<InputItem>,
    pub quality: Quality,
}

/// A successfully converted item.
///
/// Sizes are exact byte counts taken when the item was encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedItem {
    pub original_name: String,
    /// Unique within the batch; equals the item's archive entry name.
    pub output_name: String,
    pub output_bytes: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
}

impl ConvertedItem {
    pub fn reduction(&self) -> u8 {
        reduction_percent(self.original_size, self.compressed_size)
    }
}

/// An item the codec could not convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub original_name: String,
    pub reason: FailureKind,
}

/// Result of processing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Success(ConvertedItem),
    Failure(FailedItem),
}

impl ConversionOutcome {
    pub fn original_name(&self) -> &str {
        match self {
            Self::Success(item) => &item.original_name,
            Self::Failure(item) => &item.original_name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Outcomes in input order, plus the archive when anything succeeded.
#[derive(Debug, Clone, Default)]
pub struct ConversionResult {
    pub outcomes: Vec<ConversionOutcome>,
    pub archive: Option<Vec<u8>>,
}

impl ConversionResult {
    pub fn successes(&self) -> impl Iterator<Item = &ConvertedItem> {
        self.outcomes.iter().filter_map(|o| match o {
            ConversionOutcome::Success(item) => Some(item),
            ConversionOutcome::Failure(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailedItem> {
        self.outcomes.iter().filter_map(|o| match o {
            ConversionOutcome::Failure(item) => Some(item),
            ConversionOutcome::Success(_) => None,
        })
    }
}

/// Percentage saved going from `original` to `compressed` bytes.
///
/// Rounded to the nearest whole percent and clamped at zero, so a file that
/// grew reports 0. An empty original also reports 0.
pub fn reduction_percent(original: usize, compressed: usize) -> u8 {
    if original == 0 || compressed >= original {
        return 0;
    }
    let saved = (original - compressed) as f64 / original as f64 * 100.0;
    saved.round() as u8
}
