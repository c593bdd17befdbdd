//! ZIP archive builder.
//!
//! Bundles every converted image into one downloadable blob.
//!
//! ## Determinism
//!
//! The same entries always produce the same bytes:
//!
//! - entries are written in the order given
//! - every entry is `Stored` (WebP is already compressed; deflating it again
//!   wastes CPU for no gain and stored entries extract byte-for-byte)
//! - timestamps are pinned to the ZIP epoch (1980-01-01 00:00:00)
//! - unix permissions are pinned to `0o644`
//!
//! Entry names are run through [`NameAllocator`], so a duplicate name becomes
//! `name-1.ext` instead of silently shadowing the first entry.

use crate::naming::NameAllocator;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

/// Build a ZIP archive from `(name, bytes)` pairs.
pub fn build_archive<'a, I>(entries: I) -> Result<Vec<u8>, ArchiveError>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut names = NameAllocator::new();
    let options = entry_options();

    for (name, bytes) in entries {
        zip.start_file(names.allocate(name), options)?;
        zip.write_all(bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}
