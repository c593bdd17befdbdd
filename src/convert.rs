//! Batch orchestration.
//!
//! Takes a [`ConversionRequest`], converts every qualifying image and returns
//! a [`ConversionResult`] holding one outcome per image plus the combined
//! archive.
//!
//! ## Algorithm
//!
//! ```text
//! items ──filter mime──▶ images ──par_iter(codec.encode)──▶ encoded (input order)
//!                                                              │
//!                               outcomes ◀──name + account─────┘
//!                                  │
//!                                  └──successes──▶ build_archive ──▶ result
//! ```
//!
//! 1. Non-image uploads are dropped silently. They are not failures.
//! 2. Images are encoded in parallel on a rayon pool sized by
//!    [`ConvertOptions::workers`]. A long-running host builds that pool once
//!    with [`build_pool`] and passes it to [`convert_in`]; one-off callers let
//!    [`convert`] build its own. Indexed `collect` keeps input order no
//!    matter which encode finishes first.
//! 3. A failed encode becomes a [`FailedItem`]; the rest of the batch carries on.
//! 4. Successful items get unique output names in input order, then the
//!    archive is built once, after every item has finished.
//!
//! ## Errors
//!
//! Request-level problems (no files, no images, too many images) are
//! rejected before any encoding starts. An archive failure aborts the whole
//! batch: a partial archive is worse than none.

use crate::archive::{ArchiveError, build_archive};
use crate::codec::{Codec, CodecError, DecodeLimits, WebpCodec};
use crate::config::{ConversionConfig, effective_workers};
use crate::naming::{NameAllocator, output_name};
use crate::types::{
    ConversionOutcome, ConversionRequest, ConversionResult, ConvertedItem, FailedItem, InputItem,
};
use rayon::ThreadPool;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("No files provided")]
    NoFiles,
    #[error("No image files to convert")]
    NoImages,
    #[error("Too many images: {count} (limit is {max})")]
    TooManyFiles { count: usize, max: usize },
    #[error("Archive build failed: {0}")]
    Archive(#[from] ArchiveError),
    #[error("Worker pool failed to start: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl ConvertError {
    /// True for problems with the request itself rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NoFiles | Self::NoImages | Self::TooManyFiles { .. }
        )
    }
}

/// Execution limits for a batch.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Maximum images encoded at once.
    pub workers: usize,
    /// Maximum images accepted in one request.
    pub max_files: Option<usize>,
    /// Decoder allocation ceiling per image.
    pub decode_limits: DecodeLimits,
}

impl ConvertOptions {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            workers: effective_workers(config),
            max_files: config.max_files,
            decode_limits: config.decode_limits(),
        }
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::from_config(&ConversionConfig::default())
    }
}

/// Build the worker pool that bounds encoding concurrency.
pub fn build_pool(workers: usize) -> Result<ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("webp-encode-{i}"))
        .build()
}

/// Convert a batch with the production WebP codec on a fresh pool.
pub fn convert(
    request: &ConversionRequest,
    options: &ConvertOptions,
) -> Result<ConversionResult, ConvertError> {
    let codec = WebpCodec::new(options.decode_limits);
    convert_with_codec(&codec, request, options)
}

/// Convert a batch with the production WebP codec on a caller-owned pool.
pub fn convert_in(
    pool: &ThreadPool,
    request: &ConversionRequest,
    options: &ConvertOptions,
) -> Result<ConversionResult, ConvertError> {
    let codec = WebpCodec::new(options.decode_limits);
    convert_with_codec_in(pool, &codec, request, options)
}

/// Convert a batch using a specific codec (allows testing with mock).
pub fn convert_with_codec(
    codec: &impl Codec,
    request: &ConversionRequest,
    options: &ConvertOptions,
) -> Result<ConversionResult, ConvertError> {
    let pool = build_pool(options.workers)?;
    convert_with_codec_in(&pool, codec, request, options)
}

/// Convert a batch using a specific codec on a caller-owned pool.
pub fn convert_with_codec_in(
    pool: &ThreadPool,
    codec: &impl Codec,
    request: &ConversionRequest,
    options: &ConvertOptions,
) -> Result<ConversionResult, ConvertError> {
    let images = select_images(request, options)?;

    let quality = request.quality;
    let encoded: Vec<Result<Vec<u8>, CodecError>> = pool.install(|| {
        images
            .par_iter()
            .map(|item| codec.encode(&item.bytes, quality))
            .collect()
    });

    let mut names = NameAllocator::new();
    let outcomes: Vec<ConversionOutcome> = images
        .iter()
        .zip(encoded)
        .map(|(item, encoded)| match encoded {
            Ok(output_bytes) => {
                let name = names.allocate(&output_name(&item.name, codec.extension()));
                ConversionOutcome::Success(ConvertedItem {
                    original_name: item.name.clone(),
                    output_name: name,
                    original_size: item.bytes.len(),
                    compressed_size: output_bytes.len(),
                    output_bytes,
                })
            }
            Err(err) => {
                warn!(
                    item = %item.name,
                    reason = %err.kind,
                    detail = %err.detail,
                    "item failed to convert"
                );
                ConversionOutcome::Failure(FailedItem {
                    original_name: item.name.clone(),
                    reason: err.kind,
                })
            }
        })
        .collect();

    let archive = if outcomes.iter().any(ConversionOutcome::is_success) {
        let entries = outcomes.iter().filter_map(|outcome| match outcome {
            ConversionOutcome::Success(item) => {
                Some((item.output_name.as_str(), item.output_bytes.as_slice()))
            }
            ConversionOutcome::Failure(_) => None,
        });
        Some(build_archive(entries)?)
    } else {
        None
    };

    let result = ConversionResult { outcomes, archive };
    log_summary(&result, quality.value());
    Ok(result)
}

/// Validate the request and keep only the uploads the codec can decode.
fn select_images<'a>(
    request: &'a ConversionRequest,
    options: &ConvertOptions,
) -> Result<Vec<&'a InputItem>, ConvertError> {
    if request.items.is_empty() {
        return Err(ConvertError::NoFiles);
    }

    let images: Vec<&InputItem> = request
        .items
        .iter()
        .filter(|item| item.is_supported_image())
        .collect();

    let skipped = request.items.len() - images.len();
    if skipped > 0 {
        debug!(skipped, "ignoring uploads that are not supported images");
    }
    if images.is_empty() {
        return Err(ConvertError::NoImages);
    }
    if let Some(max) = options.max_files {
        if images.len() > max {
            return Err(ConvertError::TooManyFiles {
                count: images.len(),
                max,
            });
        }
    }
    Ok(images)
}

fn log_summary(result: &ConversionResult, quality: u8) {
    let (bytes_in, bytes_out) = result
        .successes()
        .fold((0usize, 0usize), |(i, o), item| {
            (i + item.original_size, o + item.compressed_size)
        });
    info!(
        quality,
        items = result.outcomes.len(),
        succeeded = result.successes().count(),
        failed = result.failures().count(),
        bytes_in,
        bytes_out,
        archive_bytes = result.archive.as_ref().map_or(0, Vec::len),
        "batch converted"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FailureKind;
    use crate::codec::Quality;
    use crate::codec::backend::tests::{MockCodec, RecordedCall};
    use std::io::{Cursor, Read};

    fn options(workers: usize) -> ConvertOptions {
        ConvertOptions {
            workers,
            max_files: None,
            decode_limits: DecodeLimits::default(),
        }
    }

    fn png(name: &str, bytes: &[u8]) -> InputItem {
        InputItem::new(name, "image/png", bytes.to_vec())
    }

    fn request(items: Vec<InputItem>) -> ConversionRequest {
        ConversionRequest {
            items,
            quality: Quality::default(),
        }
    }

    fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = Vec::new();
                file.read_to_end(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    fn success(outcome: &ConversionOutcome) -> &ConvertedItem {
        match outcome {
            ConversionOutcome::Success(item) => item,
            ConversionOutcome::Failure(item) => panic!("expected success, got {item:?}"),
        }
    }

    // =========================================================================
    // Request validation
    // =========================================================================

    #[test]
    fn empty_batch_is_rejected() {
        let codec = MockCodec::new();
        let err = convert_with_codec(&codec, &request(vec![]), &options(2)).unwrap_err();
        assert!(matches!(err, ConvertError::NoFiles));
        assert!(err.is_client_error());
        assert!(codec.get_calls().is_empty());
    }

    #[test]
    fn batch_without_images_is_rejected() {
        let codec = MockCodec::new();
        let items = vec![
            InputItem::new("notes.txt", "text/plain", b"hello".to_vec()),
            InputItem::new("data.bin", "", b"\x00\x01".to_vec()),
        ];
        let err = convert_with_codec(&codec, &request(items), &options(2)).unwrap_err();
        assert!(matches!(err, ConvertError::NoImages));
        assert!(err.is_client_error());
        assert!(codec.get_calls().is_empty());
    }

    #[test]
    fn batch_over_limit_is_rejected() {
        let codec = MockCodec::new();
        let items = (0..3).map(|i| png(&format!("{i}.png"), b"pixels")).collect();
        let opts = ConvertOptions {
            max_files: Some(2),
            ..options(2)
        };
        let err = convert_with_codec(&codec, &request(items), &opts).unwrap_err();
        assert!(matches!(err, ConvertError::TooManyFiles { count: 3, max: 2 }));
        assert!(err.is_client_error());
    }

    #[test]
    fn non_images_do_not_count_toward_limit() {
        let codec = MockCodec::new();
        let items = vec![
            png("a.png", b"pixels"),
            InputItem::new("notes.txt", "text/plain", b"hello".to_vec()),
        ];
        let opts = ConvertOptions {
            max_files: Some(1),
            ..options(1)
        };
        assert!(convert_with_codec(&codec, &request(items), &opts).is_ok());
    }

    // =========================================================================
    // Outcomes
    // =========================================================================

    #[test]
    fn single_item_gets_target_extension() {
        let codec = MockCodec::new();
        let result =
            convert_with_codec(&codec, &request(vec![png("sunset.png", b"0123456789")]), &options(1))
                .unwrap();

        assert_eq!(result.outcomes.len(), 1);
        let item = success(&result.outcomes[0]);
        assert_eq!(item.original_name, "sunset.png");
        assert_eq!(item.output_name, "sunset.webp");
    }

    #[test]
    fn non_images_are_excluded_not_failed() {
        let codec = MockCodec::new();
        let items = vec![
            png("a.png", b"aaaa"),
            InputItem::new("notes.txt", "text/plain", b"hello".to_vec()),
            InputItem::new("b.jpg", "image/jpeg", b"bbbb".to_vec()),
            InputItem::new("c.gif", "image/gif", b"GIF89a".to_vec()),
        ];
        let result = convert_with_codec(&codec, &request(items), &options(2)).unwrap();

        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(result.failures().count(), 0);
        assert_eq!(codec.get_calls().len(), 2);
    }

    #[test]
    fn sizes_are_exact_byte_counts() {
        let codec = MockCodec::new();
        let input = vec![7u8; 1000];
        let result =
            convert_with_codec(&codec, &request(vec![png("a.png", &input)]), &options(1)).unwrap();

        let item = success(&result.outcomes[0]);
        assert_eq!(item.original_size, 1000);
        assert_eq!(item.compressed_size, MockCodec::expected_output(&input).len());
        assert_eq!(item.compressed_size, item.output_bytes.len());
    }

    #[test]
    fn quality_is_passed_to_codec() {
        let codec = MockCodec::new();
        let req = ConversionRequest {
            items: vec![png("a.png", b"abcd")],
            quality: Quality::new(33),
        };
        convert_with_codec(&codec, &req, &options(1)).unwrap();
        assert_eq!(
            codec.get_calls(),
            vec![RecordedCall {
                input_len: 4,
                quality: 33
            }]
        );
    }

    #[test]
    fn failure_does_not_abort_batch() {
        let codec = MockCodec::new();
        let items = vec![
            png("a.png", b"good one"),
            InputItem::new("b.jpg", "image/jpeg", b"CORRUPT".to_vec()),
            png("c.png", b"good two"),
        ];
        let result = convert_with_codec(&codec, &request(items), &options(3)).unwrap();

        assert_eq!(result.outcomes.len(), 3);
        assert!(result.outcomes[0].is_success());
        assert_eq!(
            result.outcomes[1],
            ConversionOutcome::Failure(FailedItem {
                original_name: "b.jpg".into(),
                reason: FailureKind::Decode,
            })
        );
        assert!(result.outcomes[2].is_success());
        assert!(result.archive.is_some());
    }

    #[test]
    fn order_is_kept_when_early_items_finish_last() {
        let codec = MockCodec::new();
        let items = vec![
            png("slow.png", b"SLOW first"),
            png("fast1.png", b"fast"),
            png("fast2.png", b"fast"),
            png("fast3.png", b"fast"),
        ];
        let result = convert_with_codec(&codec, &request(items), &options(4)).unwrap();

        let names: Vec<&str> = result.outcomes.iter().map(|o| o.original_name()).collect();
        assert_eq!(names, ["slow.png", "fast1.png", "fast2.png", "fast3.png"]);
    }

    #[test]
    fn worker_count_bounds_concurrent_encodes() {
        let codec = MockCodec::new();
        let items = (0..16)
            .map(|i| png(&format!("img{i}.png"), b"SLOW encode"))
            .collect();
        let result = convert_with_codec(&codec, &request(items), &options(2)).unwrap();

        assert_eq!(result.successes().count(), 16);
        assert!(codec.peak_concurrency() >= 1);
        assert!(
            codec.peak_concurrency() <= 2,
            "peak {} exceeds 2 workers",
            codec.peak_concurrency()
        );
    }

    #[test]
    fn shared_pool_bounds_every_batch() {
        let pool = build_pool(3).unwrap();
        let codec = MockCodec::new();
        for _ in 0..2 {
            let items = (0..9)
                .map(|i| png(&format!("img{i}.png"), b"SLOW encode"))
                .collect();
            let result =
                convert_with_codec_in(&pool, &codec, &request(items), &options(3)).unwrap();
            assert_eq!(result.successes().count(), 9);
        }

        assert_eq!(codec.get_calls().len(), 18);
        assert!(codec.peak_concurrency() <= 3);
    }

    #[test]
    fn build_pool_never_has_zero_threads() {
        assert_eq!(build_pool(0).unwrap().current_num_threads(), 1);
        assert_eq!(build_pool(4).unwrap().current_num_threads(), 4);
    }

    #[test]
    fn all_failures_have_no_archive() {
        let codec = MockCodec::new();
        let items = vec![
            png("a.png", b"CORRUPT a"),
            InputItem::new("b.jpg", "image/jpeg", b"CORRUPT b".to_vec()),
        ];
        let result = convert_with_codec(&codec, &request(items), &options(2)).unwrap();

        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(result.failures().count(), 2);
        assert!(result.archive.is_none());
    }

    // =========================================================================
    // Naming and archive
    // =========================================================================

    #[test]
    fn colliding_names_are_disambiguated_in_input_order() {
        let codec = MockCodec::new();
        let items = vec![
            InputItem::new("photo.JPEG", "image/jpeg", b"first".to_vec()),
            InputItem::new("photo.jpeg", "image/jpeg", b"second".to_vec()),
            png("photo.png", b"third"),
        ];
        let result = convert_with_codec(&codec, &request(items), &options(3)).unwrap();

        let names: Vec<&str> = result
            .successes()
            .map(|item| item.output_name.as_str())
            .collect();
        assert_eq!(names, ["photo.webp", "photo-1.webp", "photo-2.webp"]);
    }

    #[test]
    fn failed_items_do_not_claim_names() {
        let codec = MockCodec::new();
        let items = vec![
            png("photo.png", b"CORRUPT"),
            InputItem::new("photo.jpg", "image/jpeg", b"fine".to_vec()),
        ];
        let result = convert_with_codec(&codec, &request(items), &options(2)).unwrap();
        assert_eq!(success(&result.outcomes[1]).output_name, "photo.webp");
    }

    #[test]
    fn archive_entries_match_outputs_exactly() {
        let codec = MockCodec::new();
        let items = vec![
            png("a.png", b"alpha bytes"),
            InputItem::new("b.jpg", "image/jpeg", b"CORRUPT".to_vec()),
            InputItem::new("a.jpg", "image/jpeg", b"another alpha".to_vec()),
        ];
        let result = convert_with_codec(&codec, &request(items), &options(2)).unwrap();

        let entries = unzip(result.archive.as_ref().unwrap());
        let expected: Vec<(String, Vec<u8>)> = result
            .successes()
            .map(|item| (item.output_name.clone(), item.output_bytes.clone()))
            .collect();
        assert_eq!(entries, expected);
        assert_eq!(entries[1].0, "a-1.webp");
    }

    // =========================================================================
    // Real codec (end to end through WebP)
    // =========================================================================

    #[test]
    fn mixed_batch_with_webp_codec() {
        use crate::codec::webp_backend::tests::png_bytes;

        let items = vec![
            InputItem::new("a.png", "image/png", png_bytes(100, 100)),
            InputItem::new("b.jpg", "image/jpeg", b"\xFF\xD8 this is not a jpeg".to_vec()),
            InputItem::new("notes.txt", "text/plain", b"remember the milk".to_vec()),
        ];
        let req = ConversionRequest {
            items,
            quality: Quality::new(80),
        };
        let result = convert(&req, &options(2)).unwrap();

        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(success(&result.outcomes[0]).output_name, "a.webp");
        assert_eq!(
            result.outcomes[1],
            ConversionOutcome::Failure(FailedItem {
                original_name: "b.jpg".into(),
                reason: FailureKind::Decode,
            })
        );

        let entries = unzip(result.archive.as_ref().unwrap());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "a.webp");
        assert_eq!(entries[0].1, success(&result.outcomes[0]).output_bytes);
    }
}
