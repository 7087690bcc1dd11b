use clap::{Parser, Subcommand};
use respimg::config::{self, RasterizeConfig};
use respimg::imaging::{Filter, RasterImage, RustRaster, SizeRequest, better_resize};
use respimg::optimize::{OptimizePasses, SystemRunner};
use respimg::rasterize::CommandRasterizer;
use respimg::{batch, optimize, output, rasterize};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

/// Target size flags shared by `resize` and `rasterize`.
#[derive(clap::Args, Clone)]
struct SizeArgs {
    /// Target width in pixels (0 = follow the aspect ratio)
    #[arg(long, default_value_t = 0)]
    width: u32,
    /// Target height in pixels (0 = follow the aspect ratio)
    #[arg(long, default_value_t = 0)]
    height: u32,
    /// Fit inside width x height instead of stretching
    #[arg(long)]
    best_fit: bool,
    /// With --best-fit, pad the result to the full box
    #[arg(long, requires = "best_fit")]
    fill: bool,
}

impl SizeArgs {
    fn request(&self) -> Result<SizeRequest, respimg::imaging::ResizeError> {
        Ok(SizeRequest::new(i64::from(self.width), i64::from(self.height))?
            .with_best_fit(self.best_fit)
            .with_fill(self.fill))
    }
}

#[derive(Parser)]
#[command(name = "respimg")]
#[command(about = "Resize images into compact, web-ready variants")]
#[command(long_about = "\
Resize images into compact, web-ready variants

Large reductions are point-sampled first, then filtered. Every result is
normalized for the web: opaque alpha, 8-bit depth, no interlacing, only color
profiles kept, light sharpening, posterized to 136 levels, quality 82.

Batch layout:

  images/
  ├── config.toml          # Optional, see 'respimg gen-config'
  ├── photo.jpg            → photo-w320.jpg, photo-w640.jpg, photo-w1280.jpg
  ├── logo.svg             → logo-w320.png, ... and logo.svg copied
  └── nested/wide.png      → nested/wide-w320.png, ...

Logging goes to stderr; set RUST_LOG=debug to see every engine step.")]
#[command(version = version_string())]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resize a single image
    Resize {
        /// Source image (JPEG, PNG, TIFF, WebP)
        input: PathBuf,
        /// Output file; format follows the extension (jpg, png, webp)
        #[arg(long, short)]
        output: PathBuf,
        #[command(flatten)]
        size: SizeArgs,
        /// Resampling filter; unknown names fall back to triangle
        #[arg(long, default_value = "triangle")]
        filter: Filter,
        /// Output will be optimized afterwards: lighter sharpening, keep metadata
        #[arg(long)]
        optim: bool,
        /// Padding color for --fill
        #[arg(long, default_value = "#ffffff")]
        background: String,
    },
    /// Resize a source tree using its config.toml, then optimize the output
    Batch {
        /// Source directory
        #[arg(long, default_value = "images")]
        source: PathBuf,
        /// Output directory
        #[arg(long, default_value = "dist")]
        output: PathBuf,
    },
    /// Run the optimizers over a file or directory
    Optimize {
        path: PathBuf,
        #[arg(long, default_value_t = 0)]
        svgo: u32,
        #[arg(long, default_value_t = 0)]
        image_optim: u32,
        #[arg(long, default_value_t = 0)]
        picopt: u32,
        #[arg(long, default_value_t = 0)]
        imageoptim: u32,
    },
    /// Render an SVG to PNG with the external renderer
    Rasterize {
        svg: PathBuf,
        /// Output directory
        #[arg(long, short, default_value = ".")]
        output: PathBuf,
        #[command(flatten)]
        size: SizeArgs,
        /// Renderer program
        #[arg(long)]
        program: Option<String>,
        /// Renderer argument placed before the payload (repeatable, needs --program)
        #[arg(long = "arg", requires = "program")]
        args: Vec<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Resize {
            input,
            output: out,
            size,
            filter,
            optim,
            background,
        } => {
            let request = size.request()?;
            let background = config::parse_hex_color(&background)
                .ok_or_else(|| format!("invalid --background color: {background}"))?;
            let mut raster = RustRaster::open(&input)?.with_background(background);
            log::debug!("{} is {}", input.display(), raster.dimensions());
            let final_size = better_resize(&mut raster, &request, filter, optim)?;
            raster.save(&out)?;
            println!("{}", output::format_single(&input, &out, final_size));
        }
        Command::Batch {
            source,
            output: out,
        } => {
            let config = config::load_config(&source)?;
            init_thread_pool(&config.processing);
            let settings = batch::BatchSettings::from_config(&config)?;
            let rasterizer =
                CommandRasterizer::new(config.rasterize.program.clone(), config.rasterize.args);

            println!("==> Resizing {} → {}", source.display(), out.display());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = batch::batch(
                &source,
                &out,
                &settings,
                &rasterizer,
                &SystemRunner,
                Some(tx),
            );
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            let summary = result?;
            println!();
            for line in output::format_batch_summary(&summary) {
                println!("{}", line);
            }
        }
        Command::Optimize {
            path,
            svgo,
            image_optim,
            picopt,
            imageoptim,
        } => {
            let passes = OptimizePasses::new(svgo, image_optim, picopt, imageoptim);
            for line in output::format_optimize_plan(&path, &passes) {
                println!("{}", line);
            }
            let log = optimize::optimize(&SystemRunner, &path, &passes)?;
            print!("{log}");
        }
        Command::Rasterize {
            svg,
            output: out,
            size,
            program,
            args,
        } => {
            let defaults = RasterizeConfig::default();
            let rasterizer = match program {
                Some(program) => CommandRasterizer::new(program, args),
                None => CommandRasterizer::new(defaults.program, defaults.args),
            };
            let path = rasterize::rasterize(&rasterizer, &svg, &out, &size.request()?)?;
            println!("{} → {}", svg.display(), path.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn rasterize_arg_requires_program() {
        let err = Cli::try_parse_from(["respimg", "rasterize", "logo.svg", "--arg", "x.js"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from([
            "respimg", "rasterize", "logo.svg", "--program", "node", "--arg", "x.js",
        ])
        .unwrap();
        match cli.command {
            Command::Rasterize { program, args, .. } => {
                assert_eq!(program.as_deref(), Some("node"));
                assert_eq!(args, vec!["x.js".to_string()]);
            }
            _ => panic!("expected rasterize"),
        }
    }
}
