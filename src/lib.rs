//! # WebP Batch
//!
//! Converts a batch of raster images (PNG, JPEG, WebP) to lossy WebP at a
//! caller-chosen quality, reports per-file outcomes with size statistics, and
//! packages every successful output into a single ZIP archive.
//!
//! # Architecture: Pure Core, Thin Edge
//!
//! ```text
//! multipart body ─► boundary ─► ConversionRequest
//!                                   │
//!                                   ▼
//!                      convert (rayon pool, one task per image)
//!                           codec ─► naming ─► archive
//!                                   │
//!                                   ▼
//!                   ConversionResult ─► boundary ─► JSON + base64
//! ```
//!
//! Everything between the two `boundary` calls works on plain in-memory types
//! and never sees HTTP, multipart or base64. The core can be driven from a
//! test, a CLI or any other transport without changes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`convert`] | Orchestrator: validates the batch, fans out encoding, assembles the result |
//! | [`codec`] | Decode any supported format, encode lossy WebP; the [`codec::Codec`] seam |
//! | [`naming`] | Output file names and collision-free allocation |
//! | [`archive`] | Deterministic ZIP assembly (stored entries, pinned metadata) |
//! | [`types`] | Request, outcome and result types shared across the pipeline |
//! | [`boundary`] | Multipart parsing and JSON response shaping |
//! | [`server`] | axum host exposing `POST /api/convert` and `GET /health` |
//! | [`config`] | `config.toml` loading, stock defaults and validation |
//!
//! # Design Decisions
//!
//! ## One Failure Never Sinks the Batch
//!
//! Every item produces exactly one [`types::ConversionOutcome`]. A corrupt or
//! unsupported file becomes a failure entry carrying a short reason; the rest
//! of the batch proceeds. Only request-level problems (no files, no images,
//! too many files) reject the whole request.
//!
//! ## Input Order Is Output Order
//!
//! Items are encoded in parallel but collected by index, so outcomes and
//! archive entries always follow upload order regardless of which encode
//! finishes first.
//!
//! ## Unique Names Within a Batch
//!
//! `photo.png` and `photo.jpg` both want `photo.webp`. The second becomes
//! `photo-1.webp`, both in the response and inside the archive, so no entry
//! overwrites another on extraction.
//!
//! ## Reproducible Archives
//!
//! Entries are stored uncompressed (WebP does not shrink further) with a fixed
//! timestamp and permissions. The same outputs always yield the same bytes.
//!
//! ## No Shared State Between Requests
//!
//! Each request builds its own codec and name table and drops them on return.
//! The only process-wide data is read-only configuration and the encoder pool,
//! which bounds total encoding threads and never holds request data.

pub mod archive;
pub mod boundary;
pub mod codec;
pub mod config;
pub mod convert;
pub mod naming;
pub mod server;
pub mod types;
