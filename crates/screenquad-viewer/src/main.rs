mod cli;
mod overlay;

use anyhow::{Context, Result};
use clap::Parser;
use winit::dpi::LogicalSize;

use screenquad_engine::SourceImage;
use screenquad_engine::device::GpuInit;
use screenquad_engine::logging::{LoggingConfig, init_logging};
use screenquad_engine::window::{Runtime, RuntimeConfig};

use crate::cli::Cli;
use crate::overlay::Overlay;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        ..Default::default()
    });

    let image = SourceImage::open(&cli.image)
        .with_context(|| format!("failed to load {}", cli.image.display()))?;
    log::info!(
        "loaded {} ({}x{})",
        cli.image.display(),
        image.width(),
        image.height()
    );

    let name = cli
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let runtime = RuntimeConfig {
        title: format!("screenquad - {name}"),
        initial_size: LogicalSize::new(f64::from(cli.width), f64::from(cli.height)),
    };

    Runtime::run(
        runtime,
        GpuInit::default(),
        Overlay::new(image, cli.compositor_config()),
    )
}
