//! SVG rasterization through an external renderer.
//!
//! The renderer receives the SVG as base64 plus the planned pixel size and
//! the output path, and writes a PNG. This module owns everything around that
//! call: probing the SVG's declared size, planning the target with the same
//! rules as raster resizing, checking the destination, and naming the output.
//!
//! Only the root element's declared `width`/`height` (or `viewBox`) is read;
//! drawing is left entirely to the renderer.

use crate::imaging::{Dimensions, ResizeError, SizeRequest, plan_size};
use crate::naming::variant_name;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterizeError {
    #[error("destination not writable: {0}")]
    DestinationNotWritable(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid SVG {path}: {reason}")]
    InvalidSvg { path: PathBuf, reason: String },
    #[error(transparent)]
    Size(#[from] ResizeError),
    #[error("failed to start renderer {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("renderer did not produce {0}")]
    RenderFailed(PathBuf),
}

/// Everything the renderer needs for one output file.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizeRequest {
    /// The SVG document, base64 encoded.
    pub source_base64: String,
    pub width: u32,
    pub height: u32,
    pub output: PathBuf,
}

impl RasterizeRequest {
    /// Plan the output size and check that `output` can be written.
    pub fn new(
        svg: &[u8],
        natural: Dimensions,
        size: &SizeRequest,
        output: &Path,
    ) -> Result<Self, RasterizeError> {
        ensure_writable(output)?;
        let planned = plan_size(natural, size)?;
        Ok(Self {
            source_base64: STANDARD.encode(svg),
            width: planned.width,
            height: planned.height,
            output: output.to_path_buf(),
        })
    }
}

/// The output's directory must exist and not be read-only.
fn ensure_writable(output: &Path) -> Result<(), RasterizeError> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let writable = fs::metadata(dir)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false);
    if writable {
        Ok(())
    } else {
        Err(RasterizeError::DestinationNotWritable(dir.to_path_buf()))
    }
}

/// Renders one request. `Ok(false)` means the renderer ran but did not
/// produce the output.
pub trait Rasterizer {
    fn render(&self, request: &RasterizeRequest) -> Result<bool, RasterizeError>;
}

/// Runs `<program> <args..> <base64> <width> <height> <output>`.
#[derive(Debug, Clone)]
pub struct CommandRasterizer {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandRasterizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Rasterizer for CommandRasterizer {
    fn render(&self, request: &RasterizeRequest) -> Result<bool, RasterizeError> {
        info!(
            "rendering {}x{} → {}",
            request.width,
            request.height,
            request.output.display()
        );
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&request.source_base64)
            .arg(request.width.to_string())
            .arg(request.height.to_string())
            .arg(&request.output)
            .status()
            .map_err(|source| RasterizeError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        debug!("{} exited with {status}", self.program);
        Ok(status.success() && request.output.exists())
    }
}

/// Rasterize `svg_path` into `output_dir` as `<stem>-w<width>.png`.
///
/// `<width>` is the requested width, matching raster variants; a height-only
/// request names the file after the planned width.
pub fn rasterize(
    rasterizer: &impl Rasterizer,
    svg_path: &Path,
    output_dir: &Path,
    size: &SizeRequest,
) -> Result<PathBuf, RasterizeError> {
    let bytes = fs::read(svg_path)?;
    let invalid = |reason: &str| RasterizeError::InvalidSvg {
        path: svg_path.to_path_buf(),
        reason: reason.to_string(),
    };
    let text = std::str::from_utf8(&bytes).map_err(|_| invalid("not UTF-8"))?;
    let natural = probe_svg_size(text).ok_or_else(|| invalid("no usable width/height or viewBox"))?;

    let width = match size.columns {
        0 => plan_size(natural, size)?.width,
        columns => columns,
    };
    let output = output_dir.join(variant_name(svg_path, width, Some("png")));
    let request = RasterizeRequest::new(&bytes, natural, size, &output)?;

    if rasterizer.render(&request)? {
        Ok(output)
    } else {
        Err(RasterizeError::RenderFailed(output))
    }
}

/// Read the declared size of an SVG document from its root element.
///
/// `width`/`height` win when both are plain numbers (optionally `px`);
/// otherwise the `viewBox` size is used.
pub fn probe_svg_size(svg: &str) -> Option<Dimensions> {
    let tag = root_tag(svg)?;
    let width = attribute(tag, "width").and_then(parse_length);
    let height = attribute(tag, "height").and_then(parse_length);
    if let (Some(width), Some(height)) = (width, height) {
        return Some(Dimensions { width, height });
    }

    let view_box = attribute(tag, "viewBox")?;
    let parts: Vec<f64> = view_box
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [_, _, w, h] => Some(Dimensions {
            width: to_pixels(*w)?,
            height: to_pixels(*h)?,
        }),
        _ => None,
    }
}

/// The `<svg ...>` start tag, without the angle brackets.
fn root_tag(svg: &str) -> Option<&str> {
    let mut rest = svg;
    loop {
        let start = rest.find("<svg")?;
        let after = &rest[start + 4..];
        if after.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/') {
            let end = after.find('>')?;
            return Some(&after[..end]);
        }
        rest = after;
    }
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut search = tag;
    while let Some(pos) = search.find(name) {
        let before_ok = search[..pos]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        let after = search[pos + name.len()..].trim_start();
        if let Some(value) = after.strip_prefix('=').filter(|_| before_ok) {
            let value = value.trim_start();
            let quote = value.chars().next()?;
            if quote == '"' || quote == '\'' {
                let body = &value[1..];
                let end = body.find(quote)?;
                return Some(&body[..end]);
            }
        }
        search = &search[pos + name.len()..];
    }
    None
}

fn parse_length(value: &str) -> Option<u32> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    to_pixels(number.parse().ok()?)
}

fn to_pixels(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.5 && value <= f64::from(u32::MAX) {
        Some(value.round() as u32)
    } else {
        None
    }
}
