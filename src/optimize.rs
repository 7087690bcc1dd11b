//! Lossless optimizer passes over generated images.
//!
//! Runs the external optimizers in a fixed order, each a configurable number
//! of times, against a single file or a whole output directory:
//!
//! | Tool | Directory | File |
//! |---|---|---|
//! | svgo | `svgo -f <dir>` | `svgo <file>` |
//! | image_optim | `image_optim -r <dir>` | `image_optim <file>` |
//! | picopt | `picopt -r <dir>` | `picopt <file>` |
//! | ImageOptim | `imageoptim -d <dir>` | `imageoptim <file>` |
//!
//! Process spawning sits behind [`ToolRunner`] so the sequencing can be
//! tested without the tools installed.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: OptimizerTool,
        #[source]
        source: io::Error,
    },
    #[error("{tool} pass {pass} exited with status {status}: {stderr}")]
    ToolFailed {
        tool: OptimizerTool,
        pass: u32,
        status: i32,
        stderr: String,
    },
}

/// The external optimizers, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerTool {
    Svgo,
    ImageOptim,
    Picopt,
    ImageOptimApp,
}

impl OptimizerTool {
    pub const ORDER: [OptimizerTool; 4] = [
        OptimizerTool::Svgo,
        OptimizerTool::ImageOptim,
        OptimizerTool::Picopt,
        OptimizerTool::ImageOptimApp,
    ];

    pub fn program(self) -> &'static str {
        match self {
            OptimizerTool::Svgo => "svgo",
            OptimizerTool::ImageOptim => "image_optim",
            OptimizerTool::Picopt => "picopt",
            OptimizerTool::ImageOptimApp => "imageoptim",
        }
    }

    /// Arguments for one pass over `path`.
    pub fn args(self, path: &Path, is_dir: bool) -> Vec<String> {
        let target = path.display().to_string();
        if !is_dir {
            return vec![target];
        }
        let flag = match self {
            OptimizerTool::Svgo => "-f",
            OptimizerTool::ImageOptim | OptimizerTool::Picopt => "-r",
            OptimizerTool::ImageOptimApp => "-d",
        };
        vec![flag.to_string(), target]
    }
}

impl fmt::Display for OptimizerTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerTool::ImageOptimApp => f.write_str("ImageOptim"),
            other => f.write_str(other.program()),
        }
    }
}

/// How many times each optimizer runs. Zero skips the tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizePasses {
    pub svgo: u32,
    pub image_optim: u32,
    pub picopt: u32,
    pub imageoptim: u32,
}

impl OptimizePasses {
    pub fn new(svgo: u32, image_optim: u32, picopt: u32, imageoptim: u32) -> Self {
        Self {
            svgo,
            image_optim,
            picopt,
            imageoptim,
        }
    }

    pub fn for_tool(&self, tool: OptimizerTool) -> u32 {
        match tool {
            OptimizerTool::Svgo => self.svgo,
            OptimizerTool::ImageOptim => self.image_optim,
            OptimizerTool::Picopt => self.picopt,
            OptimizerTool::ImageOptimApp => self.imageoptim,
        }
    }

    pub fn total(&self) -> u32 {
        OptimizerTool::ORDER.iter().map(|&t| self.for_tool(t)).sum()
    }
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code; `None` when killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs an external program to completion.
pub trait ToolRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ToolOutput>;
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ToolOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run every configured optimizer pass over `path`.
///
/// Returns the concatenated stdout of all passes. The first pass that exits
/// non-zero aborts the run.
pub fn optimize(
    runner: &impl ToolRunner,
    path: &Path,
    passes: &OptimizePasses,
) -> Result<String, OptimizeError> {
    if !path.exists() {
        return Err(OptimizeError::PathNotFound(path.display().to_string()));
    }
    let is_dir = path.is_dir();
    let mut log = String::new();

    for tool in OptimizerTool::ORDER {
        let count = passes.for_tool(tool);
        let args = tool.args(path, is_dir);
        for pass in 1..=count {
            info!("{tool} pass {pass}/{count} on {}", path.display());
            let output = runner
                .run(tool.program(), &args)
                .map_err(|source| OptimizeError::Spawn { tool, source })?;
            if !output.success() {
                return Err(OptimizeError::ToolFailed {
                    tool,
                    pass,
                    status: output.status.unwrap_or(-1),
                    stderr: output.stderr.trim().to_string(),
                });
            }
            debug!("{tool} pass {pass} wrote {} bytes of output", output.stdout.len());
            log.push_str(&output.stdout);
        }
    }
    Ok(log)
}
