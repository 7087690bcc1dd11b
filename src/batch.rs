//! Batch harness: resize a whole source tree into responsive variants.
//!
//! ## Stages
//!
//! 1. **Discover**: walk the source tree for JPEG/PNG rasters and SVGs.
//!    Files already named like a variant (`photo-w320.jpg`) are skipped so
//!    re-running over a tree that contains its own output is harmless.
//! 2. **Resize**: every raster is decoded once and run through
//!    [`better_resize`] at each configured width, in parallel.
//! 3. **Rasterize**: every SVG is rendered to PNG at each width, and the SVG
//!    itself is copied alongside.
//! 4. **Optimize**: the configured optimizer passes run over the output
//!    directory.
//!
//! ## Output Structure
//!
//! Relative directories are preserved:
//!
//! ```text
//! out/
//! ├── photo-w320.jpg
//! ├── photo-w640.jpg
//! ├── logo-w320.png
//! ├── logo.svg
//! └── nested/
//!     └── wide-w320.jpg
//! ```
//!
//! Progress is reported through an optional [`BatchEvent`] channel so the
//! CLI can print while workers run.

use crate::config::{ConfigError, RespimgConfig};
use crate::imaging::{
    Dimensions, Filter, RasterError, RasterImage, ResizeError, RustRaster, SizeRequest,
    better_resize,
};
use crate::naming::{parse_variant_name, variant_name};
use crate::optimize::{OptimizeError, OptimizePasses, ToolRunner, optimize};
use crate::rasterize::{RasterizeError, Rasterizer, rasterize};
use image::Rgba;
use log::{debug, info};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("{path}: {source}")]
    Raster {
        path: PathBuf,
        #[source]
        source: RasterError,
    },
    #[error("{path}: {source}")]
    Resize {
        path: PathBuf,
        #[source]
        source: ResizeError,
    },
    #[error(transparent)]
    Rasterize(#[from] RasterizeError),
    #[error(transparent)]
    Optimize(#[from] OptimizeError),
}

/// Resolved batch settings.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub widths: Vec<u32>,
    pub height: u32,
    pub filter: Filter,
    pub optim: bool,
    pub best_fit: bool,
    pub fill: bool,
    pub background: Rgba<u8>,
    pub passes: OptimizePasses,
}

impl BatchSettings {
    /// Build settings from a loaded config.
    pub fn from_config(config: &RespimgConfig) -> Result<Self, ConfigError> {
        let resize = &config.resize;
        Ok(Self {
            widths: resize.widths.clone(),
            height: resize.height,
            filter: resize.filter(),
            optim: resize.optim,
            best_fit: resize.best_fit,
            fill: resize.fill,
            background: resize.background_rgba()?,
            passes: config.optimize,
        })
    }

    /// The size request for one target width.
    pub fn request(&self, width: u32) -> SizeRequest {
        SizeRequest {
            columns: width,
            rows: self.height,
            best_fit: self.best_fit,
            fill: self.fill,
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            widths: vec![320, 640, 1280],
            height: 0,
            filter: Filter::Triangle,
            optim: true,
            best_fit: false,
            fill: false,
            background: Rgba([255, 255, 255, 255]),
            passes: OptimizePasses::default(),
        }
    }
}

/// Progress event, sent as each output lands.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Resized {
        source: PathBuf,
        output: PathBuf,
        size: Dimensions,
    },
    Rasterized {
        source: PathBuf,
        output: PathBuf,
    },
    Copied {
        source: PathBuf,
        output: PathBuf,
    },
    Optimizing {
        passes: u32,
    },
}

/// Counts of what a batch run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub resized: usize,
    pub rasterized: usize,
    pub copied: usize,
    pub optimizer_passes: u32,
    /// Combined optimizer stdout.
    pub optimizer_log: String,
}

/// Source files grouped by how they are processed. Paths are relative to
/// the source root, sorted.
#[derive(Debug, Default, PartialEq)]
pub struct Sources {
    pub rasters: Vec<PathBuf>,
    pub svgs: Vec<PathBuf>,
}

const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Walk `root` for rasters and SVGs, skipping anything under `exclude`.
pub fn discover_sources(root: &Path, exclude: Option<&Path>) -> Result<Sources, BatchError> {
    let mut sources = Sources::default();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| exclude.is_none_or(|ex| !entry.path().starts_with(ex)));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if parse_variant_name(&name).is_some() {
            debug!("skipping generated variant {}", path.display());
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        match extension_of(path).as_deref() {
            Some(ext) if RASTER_EXTENSIONS.contains(&ext) => {
                sources.rasters.push(relative.to_path_buf())
            }
            Some("svg") => sources.svgs.push(relative.to_path_buf()),
            _ => {}
        }
    }
    Ok(sources)
}

fn send(progress: Option<&Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = progress {
        // A closed receiver just means nobody is printing.
        let _ = tx.send(event);
    }
}

/// Run the whole batch with the given renderer and optimizer runner.
pub fn batch(
    source: &Path,
    output: &Path,
    settings: &BatchSettings,
    rasterizer: &(impl Rasterizer + Sync),
    runner: &impl ToolRunner,
    progress: Option<Sender<BatchEvent>>,
) -> Result<BatchSummary, BatchError> {
    if !source.is_dir() {
        return Err(BatchError::SourceNotFound(source.to_path_buf()));
    }
    fs::create_dir_all(output)?;
    let source = source.canonicalize()?;
    let output = output.canonicalize()?;

    let exclude = (output != source && output.starts_with(&source)).then_some(output.as_path());
    let sources = discover_sources(&source, exclude)?;
    info!(
        "found {} rasters and {} SVGs under {}",
        sources.rasters.len(),
        sources.svgs.len(),
        source.display()
    );
    let progress = progress.as_ref();

    let resized: Vec<usize> = sources
        .rasters
        .par_iter()
        .map(|relative| resize_source(&source, &output, relative, settings, progress))
        .collect::<Result<_, _>>()?;

    let rendered: Vec<usize> = sources
        .svgs
        .par_iter()
        .map(|relative| render_source(&source, &output, relative, settings, rasterizer, progress))
        .collect::<Result<_, _>>()?;

    let mut summary = BatchSummary {
        resized: resized.iter().sum(),
        rasterized: rendered.iter().sum(),
        copied: sources.svgs.len(),
        ..Default::default()
    };

    let passes = settings.passes.total();
    if passes > 0 {
        send(progress, BatchEvent::Optimizing { passes });
        summary.optimizer_log = optimize(runner, &output, &settings.passes)?;
        summary.optimizer_passes = passes;
    }
    Ok(summary)
}

/// Decode one raster and write a variant per width. Returns the count written.
fn resize_source(
    source_root: &Path,
    output_root: &Path,
    relative: &Path,
    settings: &BatchSettings,
    progress: Option<&Sender<BatchEvent>>,
) -> Result<usize, BatchError> {
    let path = source_root.join(relative);
    let out_dir = output_dir_for(output_root, relative)?;
    let original = RustRaster::open(&path)
        .map_err(|source| BatchError::Raster {
            path: path.clone(),
            source,
        })?
        .with_background(settings.background);
    debug!("{} is {}", relative.display(), original.dimensions());

    for &width in &settings.widths {
        let mut raster = original.clone();
        let request = settings.request(width);
        let size = better_resize(&mut raster, &request, settings.filter, settings.optim)
            .map_err(|source| BatchError::Resize {
                path: path.clone(),
                source,
            })?;
        let out = out_dir.join(variant_name(relative, width, None));
        raster.save(&out).map_err(|source| BatchError::Raster {
            path: out.clone(),
            source,
        })?;
        send(
            progress,
            BatchEvent::Resized {
                source: relative.to_path_buf(),
                output: relative_to(output_root, &out),
                size,
            },
        );
    }
    Ok(settings.widths.len())
}

/// Render one SVG at every width, then copy it. Returns the count rendered.
fn render_source(
    source_root: &Path,
    output_root: &Path,
    relative: &Path,
    settings: &BatchSettings,
    rasterizer: &impl Rasterizer,
    progress: Option<&Sender<BatchEvent>>,
) -> Result<usize, BatchError> {
    let path = source_root.join(relative);
    let out_dir = output_dir_for(output_root, relative)?;

    for &width in &settings.widths {
        let out = rasterize(rasterizer, &path, &out_dir, &settings.request(width))?;
        send(
            progress,
            BatchEvent::Rasterized {
                source: relative.to_path_buf(),
                output: relative_to(output_root, &out),
            },
        );
    }

    let copy = output_root.join(relative);
    if copy != path {
        fs::copy(&path, &copy)?;
    }
    send(
        progress,
        BatchEvent::Copied {
            source: relative.to_path_buf(),
            output: relative.to_path_buf(),
        },
    );
    Ok(settings.widths.len())
}

fn output_dir_for(output_root: &Path, relative: &Path) -> Result<PathBuf, BatchError> {
    let dir = match relative.parent() {
        Some(parent) => output_root.join(parent),
        None => output_root.to_path_buf(),
    };
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::ToolOutput;
    use crate::rasterize::RasterizeRequest;
    use crate::test_helpers::{create_test_jpeg, setup_source_tree};
    use std::sync::Mutex;
    use std::sync::mpsc;
    use tempfile::TempDir;

    /// Writes a placeholder PNG for every request.
    #[derive(Default)]
    struct FakeRasterizer {
        requests: Mutex<Vec<(u32, u32)>>,
    }

    impl Rasterizer for FakeRasterizer {
        fn render(&self, request: &RasterizeRequest) -> Result<bool, RasterizeError> {
            self.requests
                .lock()
                .unwrap()
                .push((request.width, request.height));
            fs::write(&request.output, b"png")?;
            Ok(true)
        }
    }

    #[derive(Default)]
    struct FakeRunner {
        calls: Mutex<Vec<String>>,
    }

    impl ToolRunner for FakeRunner {
        fn run(&self, program: &str, _args: &[String]) -> std::io::Result<ToolOutput> {
            self.calls.lock().unwrap().push(program.to_string());
            Ok(ToolOutput {
                status: Some(0),
                stdout: format!("{program}\n"),
                stderr: String::new(),
            })
        }
    }

    fn small_settings() -> BatchSettings {
        BatchSettings {
            widths: vec![50, 100],
            ..Default::default()
        }
    }

    fn image_size(path: &Path) -> (u32, u32) {
        image::image_dimensions(path).unwrap()
    }

    #[test]
    fn discover_groups_and_sorts_sources() {
        let tmp = setup_source_tree();
        let sources = discover_sources(tmp.path(), None).unwrap();
        assert_eq!(
            sources.rasters,
            vec![
                PathBuf::from("icon.png"),
                PathBuf::from("nested/wide.jpg"),
                PathBuf::from("photo.jpg"),
            ]
        );
        assert_eq!(sources.svgs, vec![PathBuf::from("logo.svg")]);
    }

    #[test]
    fn discover_skips_generated_variants() {
        let tmp = setup_source_tree();
        create_test_jpeg(&tmp.path().join("photo-w320.jpg"), 10, 10);
        let sources = discover_sources(tmp.path(), None).unwrap();
        assert!(!sources.rasters.contains(&PathBuf::from("photo-w320.jpg")));
    }

    #[test]
    fn discover_respects_exclude() {
        let tmp = setup_source_tree();
        let exclude = tmp.path().join("nested");
        let sources = discover_sources(tmp.path(), Some(&exclude)).unwrap();
        assert_eq!(sources.rasters.len(), 2);
    }

    #[test]
    fn batch_writes_every_variant() {
        let tmp = setup_source_tree();
        let out = TempDir::new().unwrap();
        let summary = batch(
            tmp.path(),
            out.path(),
            &small_settings(),
            &FakeRasterizer::default(),
            &FakeRunner::default(),
            None,
        )
        .unwrap();

        assert_eq!(summary.resized, 6);
        assert_eq!(summary.rasterized, 2);
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.optimizer_passes, 0);

        assert_eq!(image_size(&out.path().join("photo-w50.jpg")), (50, 38));
        assert_eq!(image_size(&out.path().join("photo-w100.jpg")), (100, 75));
        assert_eq!(image_size(&out.path().join("icon-w100.png")), (100, 100));
        assert_eq!(image_size(&out.path().join("nested/wide-w100.jpg")), (100, 25));
        assert!(out.path().join("logo-w50.png").exists());
        assert!(out.path().join("logo-w100.png").exists());
        assert!(out.path().join("logo.svg").exists());
        assert!(!out.path().join("notes.txt").exists());
    }

    #[test]
    fn batch_rasterizes_at_planned_sizes() {
        let tmp = setup_source_tree();
        let out = TempDir::new().unwrap();
        let rasterizer = FakeRasterizer::default();
        batch(
            tmp.path(),
            out.path(),
            &small_settings(),
            &rasterizer,
            &FakeRunner::default(),
            None,
        )
        .unwrap();

        let mut requests = rasterizer.requests.lock().unwrap().clone();
        requests.sort();
        assert_eq!(requests, vec![(50, 25), (100, 50)]);
    }

    #[test]
    fn batch_fills_best_fit_box() {
        let tmp = setup_source_tree();
        let out = TempDir::new().unwrap();
        let settings = BatchSettings {
            widths: vec![100],
            height: 100,
            best_fit: true,
            fill: true,
            ..Default::default()
        };
        batch(
            tmp.path(),
            out.path(),
            &settings,
            &FakeRasterizer::default(),
            &FakeRunner::default(),
            None,
        )
        .unwrap();

        assert_eq!(image_size(&out.path().join("photo-w100.jpg")), (100, 100));
        assert_eq!(image_size(&out.path().join("nested/wide-w100.jpg")), (100, 100));
    }

    #[test]
    fn best_fit_variants_share_width_suffix() {
        let tmp = setup_source_tree();
        let out = TempDir::new().unwrap();
        let rasterizer = FakeRasterizer::default();
        let settings = BatchSettings {
            widths: vec![100],
            height: 30,
            best_fit: true,
            ..Default::default()
        };
        batch(
            tmp.path(),
            out.path(),
            &settings,
            &rasterizer,
            &FakeRunner::default(),
            None,
        )
        .unwrap();

        // Both shrink below 100 wide to fit the 30px height
        assert_eq!(image_size(&out.path().join("photo-w100.jpg")), (40, 30));
        assert!(out.path().join("logo-w100.png").exists());
        assert_eq!(*rasterizer.requests.lock().unwrap(), vec![(60, 30)]);
    }

    #[test]
    fn batch_runs_optimizer_over_output() {
        let tmp = setup_source_tree();
        let out = TempDir::new().unwrap();
        let runner = FakeRunner::default();
        let settings = BatchSettings {
            widths: vec![50],
            passes: OptimizePasses::new(3, 1, 1, 1),
            ..Default::default()
        };
        let summary = batch(
            tmp.path(),
            out.path(),
            &settings,
            &FakeRasterizer::default(),
            &runner,
            None,
        )
        .unwrap();

        assert_eq!(summary.optimizer_passes, 6);
        assert_eq!(runner.calls.lock().unwrap().len(), 6);
        assert!(summary.optimizer_log.starts_with("svgo\n"));
    }

    #[test]
    fn batch_sends_progress_events() {
        let tmp = setup_source_tree();
        let out = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();
        batch(
            tmp.path(),
            out.path(),
            &small_settings(),
            &FakeRasterizer::default(),
            &FakeRunner::default(),
            Some(tx),
        )
        .unwrap();

        let events: Vec<BatchEvent> = rx.iter().collect();
        let resized = events
            .iter()
            .filter(|e| matches!(e, BatchEvent::Resized { .. }))
            .count();
        assert_eq!(resized, 6);
        assert!(events.contains(&BatchEvent::Copied {
            source: PathBuf::from("logo.svg"),
            output: PathBuf::from("logo.svg"),
        }));
        assert!(events.contains(&BatchEvent::Resized {
            source: PathBuf::from("photo.jpg"),
            output: PathBuf::from("photo-w100.jpg"),
            size: Dimensions {
                width: 100,
                height: 75
            },
        }));
    }

    #[test]
    fn batch_into_source_tree_skips_own_output() {
        let tmp = setup_source_tree();
        let settings = BatchSettings {
            widths: vec![40],
            ..Default::default()
        };
        let run = || {
            batch(
                tmp.path(),
                tmp.path(),
                &settings,
                &FakeRasterizer::default(),
                &FakeRunner::default(),
                None,
            )
            .unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.resized, 3);
        assert_eq!(second.resized, 3);
        assert!(tmp.path().join("photo-w40.jpg").exists());
        assert!(!tmp.path().join("photo-w40-w40.jpg").exists());
    }

    #[test]
    fn batch_missing_source_is_error() {
        let out = TempDir::new().unwrap();
        let err = batch(
            &out.path().join("nope"),
            out.path(),
            &small_settings(),
            &FakeRasterizer::default(),
            &FakeRunner::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::SourceNotFound(_)));
    }

    #[test]
    fn batch_reports_corrupt_raster() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.jpg"), b"not a jpeg").unwrap();
        let out = TempDir::new().unwrap();
        let err = batch(
            tmp.path(),
            out.path(),
            &small_settings(),
            &FakeRasterizer::default(),
            &FakeRunner::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::Raster { .. }));
    }

    #[test]
    fn settings_from_config() {
        let mut config = RespimgConfig::default();
        config.resize.filter = "lanczos".into();
        config.resize.background = "#000".into();
        config.optimize.picopt = 2;
        let settings = BatchSettings::from_config(&config).unwrap();
        assert_eq!(settings.filter, Filter::Lanczos);
        assert_eq!(settings.background, Rgba([0, 0, 0, 255]));
        assert_eq!(settings.passes.picopt, 2);
        assert_eq!(settings.request(320), SizeRequest::width(320));
    }
}
