//! CLI output formatting for every subcommand.
//!
//! # Source-First Display
//!
//! Each line leads with the source file, relative to the source root, then
//! `→` and what was produced from it. Batch workers run in parallel, so every
//! event is a single self-contained line; nothing relies on the previous line
//! for context.
//!
//! # Output Format
//!
//! ## Batch
//!
//! ```text
//! photo.jpg → photo-w320.jpg (320x240)
//! nested/wide.jpg → nested/wide-w320.jpg (320x80)
//! logo.svg → logo-w320.png (rendered)
//! logo.svg → logo.svg (copied)
//! Optimizing output (6 passes)
//!
//! Resized 6 variants, rendered 2, copied 1 SVG
//! Optimizer: 6 passes
//! ```
//!
//! ## Optimize
//!
//! ```text
//! dist/
//!     svgo: 3 passes
//!     picopt: 1 pass
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability, and `main` prints the result. Format functions are pure:
//! no I/O, no side effects.

use crate::batch::{BatchEvent, BatchSummary};
use crate::imaging::Dimensions;
use crate::optimize::{OptimizePasses, OptimizerTool};
use std::path::Path;

/// `1 pass`, `3 passes`.
fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

fn arrow(source: &Path, output: &Path, detail: &str) -> String {
    format!("{} → {} ({})", source.display(), output.display(), detail)
}

// ============================================================================
// Batch
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Resized {
            source,
            output,
            size,
        } => vec![arrow(source, output, &size.to_string())],
        BatchEvent::Rasterized { source, output } => vec![arrow(source, output, "rendered")],
        BatchEvent::Copied { source, output } => vec![arrow(source, output, "copied")],
        BatchEvent::Optimizing { passes } => vec![format!(
            "Optimizing output ({})",
            plural(*passes as usize, "pass", "passes")
        )],
    }
}

/// Format the end-of-run totals.
pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Resized {}, rendered {}, copied {}",
        plural(summary.resized, "variant", "variants"),
        summary.rasterized,
        plural(summary.copied, "SVG", "SVGs"),
    )];
    if summary.optimizer_passes > 0 {
        lines.push(format!(
            "Optimizer: {}",
            plural(summary.optimizer_passes as usize, "pass", "passes")
        ));
    }
    lines
}

// ============================================================================
// Single-file commands
// ============================================================================

/// One line for a single resize or rasterize.
pub fn format_single(source: &Path, output: &Path, size: Dimensions) -> String {
    arrow(source, output, &size.to_string())
}

/// The optimizer plan for `path`: one indented line per tool that runs.
pub fn format_optimize_plan(path: &Path, passes: &OptimizePasses) -> Vec<String> {
    let mut lines = vec![path.display().to_string()];
    for tool in OptimizerTool::ORDER {
        let count = passes.for_tool(tool);
        if count > 0 {
            lines.push(format!(
                "    {}: {}",
                tool,
                plural(count as usize, "pass", "passes")
            ));
        }
    }
    if lines.len() == 1 {
        lines.push("    nothing to run".to_string());
    }
    lines
}
