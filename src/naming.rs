//! Output file naming.
//!
//! Every converted item is named after its upload: the extension is replaced
//! by the codec's target extension.
//!
//! - `photo.png` → `photo.webp`
//! - `archive.tar.jpg` → `archive.tar.webp` (only the last suffix goes)
//! - `README` → `README.webp` (no extension, append directly)
//! - `.hidden` → `.hidden.webp` (a leading dot is not an extension)
//! - `C:\Users\me\cat.jpeg` → `cat.webp` (client paths are dropped)
//!
//! ## Collisions
//!
//! `photo.JPEG` and `photo.jpeg` both become `photo.webp`. A batch may hold
//! both, so [`NameAllocator`] hands out `photo.webp`, `photo-1.webp`,
//! `photo-2.webp`, ... in arrival order. Names are compared ignoring case,
//! including non-ASCII letters (`Ärger` and `ärger` collide), because archives
//! get extracted onto case-insensitive file systems.

use std::collections::HashSet;

/// Stem used when an upload carries no usable file name.
const FALLBACK_STEM: &str = "image";

/// Final path component of a client-supplied file name.
pub fn base_name(original: &str) -> &str {
    original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original)
        .trim()
}

/// Strip the last `.`-suffix, if any. A leading dot or an empty suffix does not count.
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => &name[..pos],
        _ => name,
    }
}

/// Derive the output name for an upload.
pub fn output_name(original: &str, extension: &str) -> String {
    let stem = file_stem(base_name(original));
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };
    format!("{stem}.{extension}")
}

/// Hands out unique names, first come first served.
#[derive(Debug, Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `wanted` if it is free, otherwise the first free `stem-N.ext`.
    pub fn allocate(&mut self, wanted: &str) -> String {
        if self.claim(wanted) {
            return wanted.to_string();
        }

        let (stem, ext) = match wanted.rfind('.') {
            Some(pos) if pos > 0 => (&wanted[..pos], &wanted[pos..]),
            _ => (wanted, ""),
        };
        let mut n = 1u32;
        loop {
            let candidate = format!("{stem}-{n}{ext}");
            if self.claim(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn claim(&mut self, name: &str) -> bool {
        self.taken.insert(name.to_lowercase())
    }
}
