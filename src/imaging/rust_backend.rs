//! Pure Rust raster engine built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` (pure Rust decoders) |
//! | ICC / EXIF profiles | `ImageDecoder::icc_profile` / `exif_metadata` |
//! | Filtered resize | `DynamicImage::resize_exact` with the nearest `image` kernel |
//! | Sample | `resize_exact` with `FilterType::Nearest` |
//! | Unsharp mask | `DynamicImage::blur` + thresholded gain |
//! | Extent | `imageops::overlay` onto a background canvas |
//! | Encode | `JpegEncoder` (quality), `PngEncoder` (`png:*` options), `WebPEncoder` (lossless) |
//!
//! Properties live in an in-memory bag: the `image` encoders have no text
//! chunk support, so they are never written out.

use super::params::{Colorspace, Filter, Interlace, Quality, Sharpening};
use super::raster::{RasterError, RasterImage};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in and known to work.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Map a whitelisted kernel onto the closest `image` crate filter.
fn kernel(filter: Filter) -> FilterType {
    match filter {
        Filter::Point | Filter::Box => FilterType::Nearest,
        Filter::Triangle | Filter::Hermite => FilterType::Triangle,
        Filter::Gaussian | Filter::Quadratic => FilterType::Gaussian,
        Filter::Cubic | Filter::CatmullRom | Filter::Mitchell => FilterType::CatmullRom,
        Filter::Hanning
        | Filter::Hamming
        | Filter::Blackman
        | Filter::Lanczos
        | Filter::Bessel
        | Filter::Sinc => FilterType::Lanczos3,
    }
}

/// An in-memory image plus the profiles, properties and encoder state kept
/// alongside pixels.
#[derive(Clone)]
pub struct RustRaster {
    image: DynamicImage,
    profiles: BTreeMap<String, Vec<u8>>,
    properties: BTreeMap<String, String>,
    options: BTreeMap<String, String>,
    quality: Quality,
    interlace: Interlace,
    background: Rgba<u8>,
}

fn decode_error(path: &Path, e: image::ImageError) -> RasterError {
    RasterError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
}

impl RustRaster {
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image,
            profiles: BTreeMap::new(),
            properties: BTreeMap::new(),
            options: BTreeMap::new(),
            quality: Quality::new(92),
            interlace: Interlace::None,
            background: Rgba([255, 255, 255, 255]),
        }
    }

    /// Decode an image from disk, keeping its ICC and EXIF blocks as profiles.
    pub fn open(path: &Path) -> Result<Self, RasterError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let mut decoder = reader.into_decoder().map_err(|e| decode_error(path, e))?;

        let mut profiles = BTreeMap::new();
        if let Some(icc) = decoder.icc_profile().map_err(|e| decode_error(path, e))? {
            profiles.insert("icc".to_string(), icc);
        }
        match decoder.exif_metadata() {
            Ok(Some(exif)) => {
                profiles.insert("exif".to_string(), exif);
            }
            Ok(None) => {}
            Err(e) => log::warn!("ignoring unreadable EXIF in {}: {e}", path.display()),
        }

        let image = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
        Ok(Self {
            profiles,
            ..Self::from_image(image)
        })
    }

    /// Color used for canvas area not covered by the image.
    pub fn with_background(mut self, background: Rgba<u8>) -> Self {
        self.background = background;
        self
    }

    pub fn with_profile(mut self, name: &str, data: Vec<u8>) -> Self {
        self.profiles.insert(name.to_string(), data);
        self
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn interlace(&self) -> Interlace {
        self.interlace
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Encode to `path`, choosing the codec from the file extension.
    pub fn save(&self, path: &Path) -> Result<(), RasterError> {
        let format = ImageFormat::from_path(path).map_err(|_| {
            RasterError::Unsupported(format!("output format of {}", path.display()))
        })?;
        if !matches!(
            format,
            ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP
        ) {
            return Err(RasterError::Unsupported(format!(
                "output format {format:?}"
            )));
        }

        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        let result = match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(self.image.to_rgb8());
                let mut encoder = JpegEncoder::new_with_quality(writer, self.jpeg_quality());
                self.attach_icc(&mut encoder);
                rgb.write_with_encoder(encoder)
            }
            ImageFormat::Png => {
                let mut encoder =
                    PngEncoder::new_with_quality(writer, self.png_compression(), self.png_filter());
                if !self.png_excludes_ancillary() {
                    self.attach_icc(&mut encoder);
                }
                compact_layout(&self.image).write_with_encoder(encoder)
            }
            _ => {
                let mut encoder = WebPEncoder::new_lossless(writer);
                self.attach_icc(&mut encoder);
                compact_layout(&self.image).write_with_encoder(encoder)
            }
        };
        result.map_err(|e| {
            RasterError::ProcessingFailed(format!("Failed to encode {}: {}", path.display(), e))
        })
    }

    fn jpeg_quality(&self) -> u8 {
        // Quality is clamped to 1..=100 on construction
        self.quality.value() as u8
    }

    fn attach_icc(&self, encoder: &mut impl ImageEncoder) {
        let icc = self
            .profiles
            .get("icc")
            .or_else(|| self.profiles.get("icm"));
        if let Some(icc) = icc {
            if let Err(e) = encoder.set_icc_profile(icc.clone()) {
                log::warn!("encoder dropped ICC profile: {e}");
            }
        }
    }

    fn png_compression(&self) -> CompressionType {
        match self.option("png:compression-level").and_then(|v| v.parse::<u8>().ok()) {
            Some(0..=3) => CompressionType::Fast,
            Some(7..=9) => CompressionType::Best,
            _ => CompressionType::Default,
        }
    }

    fn png_filter(&self) -> PngFilter {
        match self.option("png:compression-filter").and_then(|v| v.parse::<u8>().ok()) {
            Some(0) => PngFilter::NoFilter,
            Some(1) => PngFilter::Sub,
            Some(2) => PngFilter::Up,
            Some(3) => PngFilter::Avg,
            Some(4) => PngFilter::Paeth,
            _ => PngFilter::Adaptive,
        }
    }

    fn png_excludes_ancillary(&self) -> bool {
        self.option("png:exclude-chunk").is_some_and(|chunks| {
            chunks
                .split(',')
                .any(|c| c.trim().eq_ignore_ascii_case("all") || c.trim().eq_ignore_ascii_case("iccp"))
        })
    }

    fn ensure_8bit(&mut self) {
        let image = std::mem::replace(&mut self.image, DynamicImage::new_rgb8(0, 0));
        self.image = into_8bit(image);
    }

    fn samples(&mut self) -> Result<Samples<'_>, RasterError> {
        self.ensure_8bit();
        samples_mut(&mut self.image)
            .ok_or_else(|| RasterError::ProcessingFailed("expected 8-bit samples".into()))
    }
}

/// Narrowest lossless layout for an 8-bit image: a fully opaque alpha
/// channel is dropped and neutral pixels are written as luma.
fn compact_layout(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    let neutral = |p: &[u8]| p[0] == p[1] && p[1] == p[2];
    let compacted = match image {
        DynamicImage::ImageRgba8(buf) => {
            let opaque = buf.pixels().all(|p| p.0[3] == u8::MAX);
            let gray = buf.pixels().all(|p| neutral(&p.0));
            match (opaque, gray) {
                (true, true) => Some(DynamicImage::ImageLuma8(image.to_luma8())),
                (true, false) => Some(DynamicImage::ImageRgb8(image.to_rgb8())),
                (false, true) => Some(DynamicImage::ImageLumaA8(image.to_luma_alpha8())),
                (false, false) => None,
            }
        }
        DynamicImage::ImageRgb8(buf) if buf.pixels().all(|p| neutral(&p.0)) => {
            Some(DynamicImage::ImageLuma8(image.to_luma8()))
        }
        DynamicImage::ImageLumaA8(buf) if buf.pixels().all(|p| p.0[1] == u8::MAX) => {
            Some(DynamicImage::ImageLuma8(image.to_luma8()))
        }
        _ => None,
    };
    match compacted {
        Some(narrow) => Cow::Owned(narrow),
        None => Cow::Borrowed(image),
    }
}

fn into_8bit(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => image,
        other => {
            let color = other.color();
            match (color.has_color(), color.has_alpha()) {
                (true, true) => DynamicImage::ImageRgba8(other.to_rgba8()),
                (true, false) => DynamicImage::ImageRgb8(other.to_rgb8()),
                (false, true) => DynamicImage::ImageLumaA8(other.to_luma_alpha8()),
                (false, false) => DynamicImage::ImageLuma8(other.to_luma8()),
            }
        }
    }
}

/// Interleaved 8-bit samples with their channel layout.
struct Samples<'a> {
    data: &'a mut [u8],
    channels: usize,
    /// Leading channels that carry color; the rest is alpha.
    color_channels: usize,
}

impl Samples<'_> {
    fn for_each_color(&mut self, mut f: impl FnMut(usize, &mut u8)) {
        let (channels, color) = (self.channels, self.color_channels);
        for (i, value) in self.data.iter_mut().enumerate() {
            if i % channels < color {
                f(i, value);
            }
        }
    }
}

fn samples_mut(image: &mut DynamicImage) -> Option<Samples<'_>> {
    let (data, channels, color_channels): (&mut [u8], usize, usize) = match image {
        DynamicImage::ImageLuma8(buf) => (&mut **buf, 1, 1),
        DynamicImage::ImageLumaA8(buf) => (&mut **buf, 2, 1),
        DynamicImage::ImageRgb8(buf) => (&mut **buf, 3, 3),
        DynamicImage::ImageRgba8(buf) => (&mut **buf, 4, 3),
        _ => return None,
    };
    Some(Samples {
        data,
        channels,
        color_channels,
    })
}

fn posterize_value(value: u8, levels: u32) -> u8 {
    let steps = (levels - 1) as f32;
    let max = f32::from(u8::MAX);
    let level = (f32::from(value) / max * steps).round();
    (level * max / steps).round() as u8
}

impl RasterImage for RustRaster {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn alpha_channel_defined(&self) -> bool {
        self.image.color().has_alpha()
    }

    fn set_alpha_opaque(&mut self) -> Result<(), RasterError> {
        let mut rgba = self.image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            pixel.0[3] = u8::MAX;
        }
        self.image = DynamicImage::ImageRgba8(rgba);
        Ok(())
    }

    fn set_bit_depth(&mut self, depth: u8) -> Result<(), RasterError> {
        if depth != 8 {
            return Err(RasterError::Unsupported(format!("bit depth {depth}")));
        }
        self.ensure_8bit();
        Ok(())
    }

    fn set_interlace(&mut self, interlace: Interlace) -> Result<(), RasterError> {
        self.interlace = interlace;
        Ok(())
    }

    fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    fn remove_profile(&mut self, name: &str) -> Result<(), RasterError> {
        self.profiles.remove(name);
        Ok(())
    }

    fn delete_property(&mut self, name: &str) -> Result<(), RasterError> {
        self.properties.remove(name);
        Ok(())
    }

    fn set_property(&mut self, name: &str, value: &str) -> Result<(), RasterError> {
        self.properties.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn set_option(&mut self, key: &str, value: &str) -> Result<(), RasterError> {
        self.options.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn resize(
        &mut self,
        width: u32,
        height: u32,
        filter: Filter,
        blur: f64,
    ) -> Result<(), RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::ProcessingFailed(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        if blur != 1.0 {
            log::debug!("blur factor {blur} ignored, image kernels are fixed");
        }
        self.image = self.image.resize_exact(width, height, kernel(filter));
        Ok(())
    }

    fn sample(&mut self, width: u32, height: u32) -> Result<(), RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::ProcessingFailed(format!(
                "cannot sample to {width}x{height}"
            )));
        }
        self.image = self.image.resize_exact(width, height, FilterType::Nearest);
        Ok(())
    }

    fn unsharp_mask(&mut self, sharpening: Sharpening) -> Result<(), RasterError> {
        self.ensure_8bit();
        // `image` sizes the gaussian kernel from sigma; radius has no counterpart
        log::trace!("unsharp radius {} follows sigma {}", sharpening.radius, sharpening.sigma);
        let blurred = self.image.blur(sharpening.sigma);
        let soft = blurred.as_bytes();
        let threshold = sharpening.threshold * f32::from(u8::MAX);
        let amount = sharpening.amount;

        self.samples()?.for_each_color(|i, value| {
            let original = f32::from(*value);
            let diff = original - f32::from(soft[i]);
            if (2.0 * diff).abs() >= threshold {
                *value = (original + diff * amount).round().clamp(0.0, 255.0) as u8;
            }
        });
        Ok(())
    }

    fn posterize(&mut self, levels: u32, dither: bool) -> Result<(), RasterError> {
        if dither {
            return Err(RasterError::Unsupported("dithered posterize".into()));
        }
        if levels < 2 {
            return Err(RasterError::ProcessingFailed(format!(
                "posterize needs at least 2 levels, got {levels}"
            )));
        }
        self.samples()?
            .for_each_color(|_, value| *value = posterize_value(*value, levels));
        Ok(())
    }

    fn set_compression_quality(&mut self, quality: Quality) -> Result<(), RasterError> {
        self.quality = Quality::new(quality.value());
        Ok(())
    }

    fn set_colorspace(&mut self, colorspace: Colorspace) -> Result<(), RasterError> {
        let alpha = self.image.color().has_alpha();
        self.image = match (colorspace, alpha) {
            (Colorspace::Srgb, true) => DynamicImage::ImageRgba8(self.image.to_rgba8()),
            (Colorspace::Srgb, false) => DynamicImage::ImageRgb8(self.image.to_rgb8()),
            (Colorspace::Gray, true) => DynamicImage::ImageLumaA8(self.image.to_luma_alpha8()),
            (Colorspace::Gray, false) => DynamicImage::ImageLuma8(self.image.to_luma8()),
        };
        Ok(())
    }

    fn strip_metadata(&mut self) -> Result<(), RasterError> {
        self.profiles.clear();
        self.properties.clear();
        Ok(())
    }

    fn extent_canvas(
        &mut self,
        width: u32,
        height: u32,
        offset_x: i64,
        offset_y: i64,
    ) -> Result<(), RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::ProcessingFailed(format!(
                "cannot extend canvas to {width}x{height}"
            )));
        }
        let alpha = self.image.color().has_alpha();
        let mut canvas = RgbaImage::from_pixel(width, height, self.background);
        image::imageops::overlay(&mut canvas, &self.image.to_rgba8(), -offset_x, -offset_y);
        let canvas = DynamicImage::ImageRgba8(canvas);
        self.image = if alpha {
            canvas
        } else {
            DynamicImage::ImageRgb8(canvas.to_rgb8())
        };
        Ok(())
    }
}
