//! Binary entrypoint for backdrop-blur.
//!
//! Renders one frosted frame of a PNG scene. All logic lives in the library
//! crate.

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use backdrop_blur::config::{BlurConfig, Configuration};
use backdrop_blur::events::FrameObserver;
use backdrop_blur::processing::blur::{DEFAULT_DETACHED_SCALE, blur_detached};
use backdrop_blur::render::canvas::RasterCanvas;
use backdrop_blur::render::host::{FixedTarget, ImageRegion};
use backdrop_blur::render::overlay::OverlayBlur;
use clap::{ArgAction, Parser};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Frosted-glass backdrop renderer
#[derive(Debug, Parser)]
#[command(name = "backdrop-blur", version, about = "Render a blurred backdrop panel")]
struct Cli {
    /// Path to YAML scene file
    #[arg(short, long, value_name = "FILE", default_value = "scene.yaml")]
    config: PathBuf,

    /// Where to write the rendered PNG
    #[arg(short, long, value_name = "FILE", default_value = "out.png")]
    output: PathBuf,

    /// Blur the whole source on a worker thread instead of rendering the panel
    #[arg(long)]
    detached: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(
        format!("backdrop_blur={level}")
            .parse()
            .context("invalid log directive")?,
    );
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading scene from {}", cli.config.display()))?
        .validated()
        .context("validating scene")?;
    let source = image::open(&cfg.source_image)
        .with_context(|| format!("reading {}", cfg.source_image.display()))?
        .to_rgba8();
    info!(
        width = source.width(),
        height = source.height(),
        "loaded source image"
    );

    let output = if cli.detached {
        render_detached(source, &cfg)?
    } else {
        render_panel(source, &cfg)?
    };
    output
        .save(&cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!(path = %cli.output.display(), "wrote frame");
    Ok(())
}

fn render_panel(source: image::RgbaImage, cfg: &Configuration) -> Result<image::RgbaImage> {
    let observer = FrameObserver::new();
    let source = Rc::new(ImageRegion::new(cfg.source_origin, source).with_observer(observer.clone()));
    let target = Rc::new(FixedTarget::new(cfg.target_region));
    let config = BlurConfig::builder()
        .source_region(source)
        .target_region(target)
        .options(cfg.blur.clone())
        .build()?;

    let mut panel = OverlayBlur::default();
    panel.configure(&config)?;
    panel.set_auto_update(true)?;
    let refreshed = observer.dispatch_pre_draw();
    info!(refreshed, "dispatched pre-draw");

    let mut canvas = RasterCanvas::new(cfg.target_region.width, cfg.target_region.height);
    if !panel.draw(&mut canvas)? {
        warn!("panel skipped compositing");
    }
    Ok(canvas.into_image())
}

fn render_detached(source: image::RgbaImage, cfg: &Configuration) -> Result<image::RgbaImage> {
    let radius = cfg.blur.blur_radius.round().max(1.0) as u32;
    let worker = std::thread::spawn(move || blur_detached(&source, radius, DEFAULT_DETACHED_SCALE));
    let blurred = worker
        .join()
        .map_err(|_| anyhow!("detached blur worker panicked"))??;
    Ok(blurred)
}
