//! Encoding parameters shared by every codec.
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction,
//!   so a `Quality` value is always valid by the time it reaches a codec.
//! - [`DecodeLimits`]: Ceiling on decoder allocations for a single image.

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;
    /// The one canonical default, used whenever a caller supplies no usable value.
    pub const DEFAULT: u8 = 80;

    /// Build a quality value, clamping anything outside 1–100.
    pub fn new(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Quality as libwebp expects it (0.0–100.0).
    pub fn as_f32(self) -> f32 {
        f32::from(self.0)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoder resource ceiling applied to every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum bytes the decoder may allocate for one image.
    pub max_alloc_bytes: u64,
}

impl DecodeLimits {
    pub fn from_megabytes(mb: u64) -> Self {
        Self {
            max_alloc_bytes: mb.saturating_mul(1024 * 1024),
        }
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::from_megabytes(512)
    }
}
