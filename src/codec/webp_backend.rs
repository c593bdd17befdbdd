//! Production codec: decode with the `image` crate, encode lossy WebP with libwebp.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Format sniffing | `image::guess_format` (magic bytes, never the declared mime-type) |
//! | Decode (JPEG, PNG, WebP) | `image::ImageReader` under `image::Limits` |
//! | Encode → lossy WebP | `webp::Encoder::encode_simple` (libwebp) |
//!
//! The `image` crate's own WebP encoder is lossless-only, so the quality knob
//! has to go through libwebp.

use super::backend::{Codec, CodecError, FailureKind};
use super::params::{DecodeLimits, Quality};
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::io::Cursor;

/// Formats whose decoders are compiled in (see the `image` features in Cargo.toml).
const DECODABLE: &[ImageFormat] = &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// libwebp refuses either side above this.
const WEBP_MAX_DIMENSION: u32 = 16383;

/// Transcodes PNG, JPEG and WebP input into lossy WebP.
#[derive(Debug, Clone, Default)]
pub struct WebpCodec {
    limits: DecodeLimits,
}

impl WebpCodec {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        let format = image::guess_format(bytes).map_err(|e| {
            CodecError::new(FailureKind::Decode, format!("unrecognised image data: {e}"))
        })?;
        if !DECODABLE.contains(&format) {
            return Err(CodecError::new(
                FailureKind::Decode,
                format!("no decoder for {format:?}"),
            ));
        }

        let mut limits = image::Limits::default();
        limits.max_alloc = Some(self.limits.max_alloc_bytes);

        let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
        reader.limits(limits);
        reader.decode().map_err(classify)
    }
}

/// Map an `image` error onto the reason a caller sees.
fn classify(err: ImageError) -> CodecError {
    let kind = match &err {
        ImageError::Unsupported(_) => FailureKind::Unsupported,
        ImageError::Limits(_) => FailureKind::TooLarge,
        ImageError::Encoding(_) => FailureKind::Encode,
        ImageError::Decoding(_) | ImageError::IoError(_) | ImageError::Parameter(_) => {
            FailureKind::Decode
        }
    };
    CodecError::new(kind, err.to_string())
}

fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, CodecError> {
    let (width, height) = (img.width(), img.height());
    if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
        return Err(CodecError::new(
            FailureKind::Encode,
            format!("{width}x{height} exceeds the WebP limit of {WEBP_MAX_DIMENSION}px per side"),
        ));
    }

    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_simple(false, quality.as_f32())
            .map(|memory| memory.to_vec())
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height)
            .encode_simple(false, quality.as_f32())
            .map(|memory| memory.to_vec())
    };

    encoded.map_err(|e| CodecError::new(FailureKind::Encode, format!("libwebp: {e:?}")))
}

impl Codec for WebpCodec {
    fn extension(&self) -> &'static str {
        "webp"
    }

    fn encode(&self, bytes: &[u8], quality: Quality) -> Result<Vec<u8>, CodecError> {
        let img = self.decode(bytes)?;
        encode_webp(&img, quality)
    }
}
