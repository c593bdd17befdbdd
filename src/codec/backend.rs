//! Codec trait and the typed failure every codec reports.
//!
//! The [`Codec`] trait is the single seam between the batch orchestrator and
//! pixel work. The production implementation is
//! [`WebpCodec`](super::webp_backend::WebpCodec); tests swap in a recording
//! mock so orchestration logic runs without encoding real images.

use super::params::Quality;
use thiserror::Error;

/// Why a single item could not be converted.
///
/// The `Display` string is the reason shown to callers. Decoder and encoder
/// detail stays in [`CodecError::detail`] and only reaches the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Malformed or truncated bytes, or a format with no compiled-in decoder.
    Decode,
    /// The decoder understood the container but not a feature of it (e.g. color model).
    Unsupported,
    /// Decoding would exceed the configured allocation ceiling.
    TooLarge,
    /// The encoder rejected the decoded pixels.
    Encode,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode error",
            Self::Unsupported => "unsupported image",
            Self::TooLarge => "image too large",
            Self::Encode => "encode error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct CodecError {
    pub kind: FailureKind,
    pub detail: String,
}

impl CodecError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// A raster transcoder with a fixed target format.
///
/// Implementations must be pure: no filesystem or network access, no state
/// shared between calls. `Sync` lets the orchestrator fan items out across a
/// rayon pool with a shared `&impl Codec`.
pub trait Codec: Sync {
    /// File extension of the target format, without the dot.
    fn extension(&self) -> &'static str;

    /// Re-encode `bytes` into the target format at `quality`.
    fn encode(&self, bytes: &[u8], quality: Quality) -> Result<Vec<u8>, CodecError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Inputs starting with this prefix fail with [`FailureKind::Decode`].
    pub const CORRUPT_PREFIX: &[u8] = b"CORRUPT";
    /// Inputs starting with this prefix are encoded after a short sleep.
    pub const SLOW_PREFIX: &[u8] = b"SLOW";

    /// Mock codec that records calls and "encodes" by keeping the first half
    /// of the input behind a fixed marker.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    /// Also tracks how many encodes run at once.
    #[derive(Default)]
    pub struct MockCodec {
        pub calls: Mutex<Vec<RecordedCall>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub input_len: usize,
        pub quality: u8,
    }

    impl MockCodec {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Highest number of encodes observed running concurrently.
        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        /// What [`Codec::encode`] returns for a healthy input.
        pub fn expected_output(bytes: &[u8]) -> Vec<u8> {
            let mut out = b"MOCKWEBP".to_vec();
            out.extend_from_slice(&bytes[..bytes.len() / 2]);
            out
        }
    }

    impl Codec for MockCodec {
        fn extension(&self) -> &'static str {
            "webp"
        }

        fn encode(&self, bytes: &[u8], quality: Quality) -> Result<Vec<u8>, CodecError> {
            self.calls.lock().unwrap().push(RecordedCall {
                input_len: bytes.len(),
                quality: quality.value(),
            });

            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);

            let result = if bytes.starts_with(CORRUPT_PREFIX) {
                Err(CodecError::new(FailureKind::Decode, "mock corrupt input"))
            } else {
                if bytes.starts_with(SLOW_PREFIX) {
                    std::thread::sleep(Duration::from_millis(40));
                }
                Ok(Self::expected_output(bytes))
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[test]
    fn failure_kind_reasons() {
        assert_eq!(FailureKind::Decode.to_string(), "decode error");
        assert_eq!(FailureKind::Unsupported.to_string(), "unsupported image");
        assert_eq!(FailureKind::TooLarge.to_string(), "image too large");
        assert_eq!(FailureKind::Encode.to_string(), "encode error");
    }

    #[test]
    fn codec_error_display_includes_detail() {
        let err = CodecError::new(FailureKind::Decode, "bad huffman table");
        assert_eq!(err.to_string(), "decode error: bad huffman table");
    }

    #[test]
    fn mock_records_calls() {
        let codec = MockCodec::new();
        codec.encode(b"0123456789", Quality::new(42)).unwrap();

        let calls = codec.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            RecordedCall {
                input_len: 10,
                quality: 42
            }
        );
    }

    #[test]
    fn mock_fails_on_corrupt_prefix() {
        let codec = MockCodec::new();
        let err = codec.encode(b"CORRUPT bytes", Quality::default()).unwrap_err();
        assert_eq!(err.kind, FailureKind::Decode);
    }
}
