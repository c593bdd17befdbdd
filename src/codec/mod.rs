//! Codec adapter: raw bytes in, lossy WebP out.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff** | `image::guess_format` |
//! | **Decode** | `image::ImageReader` with allocation limits |
//! | **Encode → WebP** | libwebp through the `webp` crate |
//!
//! The module is split into:
//! - **Parameters**: [`Quality`] and [`DecodeLimits`]
//! - **Backend**: [`Codec`] trait + typed [`CodecError`]
//! - **WebP backend**: [`WebpCodec`], the production implementation

pub mod backend;
mod params;
pub mod webp_backend;

pub use backend::{Codec, CodecError, FailureKind};
pub use params::{DecodeLimits, Quality};
pub use webp_backend::WebpCodec;
