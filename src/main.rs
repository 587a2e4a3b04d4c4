//! Binary entrypoint for Earth Canvas.
//!
//! Drives one headless render round: load an image, apply canvas shapes from
//! a JSON file, submit to the rendering backend, and write the result.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use earth_canvas::backend::HttpBackend;
use earth_canvas::canvas::Shape;
use earth_canvas::render::RenderFlow;
use earth_canvas::session::Session;
use earth_canvas::workflow::WorkflowTemplate;

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "earth-canvas", about = "Mask-and-prompt image editing front-end")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Image to edit
    #[arg(long, value_name = "IMAGE")]
    image: PathBuf,

    /// JSON file of display-space canvas shapes
    #[arg(long, value_name = "FILE")]
    shapes: PathBuf,

    /// Natural-language description of the desired change
    #[arg(short, long, value_name = "TEXT")]
    prompt: String,

    /// Where to write the rendered image
    #[arg(short, long, value_name = "FILE", default_value = "render.png")]
    output: PathBuf,

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
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("earth_canvas={}", level).parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap());
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = earth_canvas::config::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?
        .validated()
        .context("validating configuration")?;

    // The workflow template is required before any other work happens.
    let template = WorkflowTemplate::load(&cfg.workflow.template_path, cfg.workflow.slots.clone())
        .context("loading workflow template")?;

    let image = image::ImageReader::open(&cli.image)
        .with_context(|| format!("opening {}", cli.image.display()))?
        .with_guessed_format()?
        .decode()
        .context("decoding input image")?
        .to_rgba8();
    let mut session = Session::new(image, cfg.canvas.max_width);
    let region = session.display_region();
    let (dw, dh) = region.display_size();
    info!(display_w = dw, display_h = dh, "session ready");

    let shapes_text = std::fs::read_to_string(&cli.shapes)
        .with_context(|| format!("reading shapes from {}", cli.shapes.display()))?;
    let shapes: Vec<Shape> = serde_json::from_str(&shapes_text).context("parsing shapes JSON")?;
    info!(count = shapes.len(), "loaded canvas shapes");
    session.extend_shapes(shapes);

    let backend = HttpBackend::new(&cfg.server.base_url, cfg.render.timeout)
        .context("building backend client")?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling render");
            ctrl_c_cancel.cancel();
        }
    });

    let mut flow = RenderFlow::new(&backend, &template);
    let job = flow
        .submit(&mut session, &cli.prompt, &cancel)
        .await
        .context("render submission failed")?;
    info!(%job, "render finished");

    session
        .active_image()
        .save(&cli.output)
        .with_context(|| format!("writing output to {}", cli.output.display()))?;
    info!("wrote {}", cli.output.display());
    Ok(())
}
