//! `lux <scene> [config.json] [output]`
//!
//! Renders one of the built-in scenes with the configured integrator and
//! writes the result. `.hdr`/`.exr` outputs keep linear radiance.

use anyhow::{bail, Context, Result};
use lux_renderer::{check_scene, create_integrator, scenes, RenderConfig};
use std::path::PathBuf;
use std::time::Instant;

const DEFAULT_OUTPUT: &str = "lux.png";

struct Args {
    scene: String,
    config: Option<PathBuf>,
    output: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let Some(scene) = args.next() else {
        bail!(
            "usage: lux <scene> [config.json] [output]\n  scenes: {}",
            scenes::SCENE_NAMES.join(", ")
        );
    };
    let config = args.next().map(PathBuf::from);
    let output = args.next().map_or_else(|| PathBuf::from(DEFAULT_OUTPUT), PathBuf::from);
    if let Some(extra) = args.next() {
        bail!("unexpected argument '{extra}'");
    }
    Ok(Args { scene, config, output })
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => RenderConfig::from_json_file(path)
            .with_context(|| format!("Failed to load render config {}", path.display()))?,
        None => RenderConfig::default(),
    };
    config.validate().context("Invalid render config")?;

    let start = Instant::now();
    let scene = scenes::by_name(&args.scene, &config)
        .with_context(|| format!("Failed to build scene '{}'", args.scene))?;
    check_scene(&config, &scene)?;
    log::info!("Scene '{}' built in {:.2?}", args.scene, start.elapsed());

    let mut integrator = create_integrator(&config).context("Failed to create integrator")?;
    log::info!(
        "Rendering {}x{} with {} for {} passes",
        config.width,
        config.height,
        integrator.name(),
        config.passes
    );

    let start = Instant::now();
    for _ in 0..config.passes {
        integrator.render_one_pass(&scene);
    }
    log::info!("Rendered {} passes in {:.2?}", integrator.passes(), start.elapsed());

    integrator
        .image()
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    Ok(())
}
