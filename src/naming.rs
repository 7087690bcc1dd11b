//! Output filename convention for resized variants.
//!
//! Every generated file is named after its source with a `-w<width>` suffix
//! before the extension:
//! - `photo.jpg` at 320px → `photo-w320.jpg`
//! - `logo.svg` rasterized at 640px → `logo-w640.png`
//!
//! The batch harness also uses [`parse_variant_name`] to recognise files it
//! generated on an earlier run so they are never fed back in as sources.

use std::path::Path;

/// Result of parsing a variant name like `photo-w320.jpg`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantName {
    /// Source stem (`photo`).
    pub stem: String,
    /// Target width (`320`).
    pub width: u32,
    /// Extension without the dot, as written.
    pub extension: String,
}

/// Build the output filename for `source` resized to `width`.
///
/// `extension` overrides the source extension (used when rasterizing SVG to
/// PNG). Sources without a stem fall back to `image`.
pub fn variant_name(source: &Path, width: u32, extension: Option<&str>) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    let ext = extension
        .or_else(|| source.extension().and_then(|e| e.to_str()))
        .unwrap_or("png");
    format!("{stem}-w{width}.{ext}")
}

/// Parse a filename following the `<stem>-w<width>.<ext>` convention.
///
/// Handles these patterns:
/// - `"photo-w320.jpg"` → stem="photo", width=320, extension="jpg"
/// - `"my-trip-w1280.png"` → stem="my-trip", width=1280
/// - `"photo.jpg"` → `None` (no width suffix)
/// - `"photo-wide.jpg"` → `None` (suffix is not a number)
pub fn parse_variant_name(filename: &str) -> Option<VariantName> {
    let (base, extension) = filename.rsplit_once('.')?;
    let (stem, width) = base.rsplit_once("-w")?;
    if stem.is_empty() || width.is_empty() || !width.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(VariantName {
        stem: stem.to_string(),
        width: width.parse().ok()?,
        extension: extension.to_string(),
    })
}
