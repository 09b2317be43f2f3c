mod app;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use bbox_annotate::Config;
use clap::Parser;
use eframe::egui;
use log::info;

/// Draw labelled bounding boxes over a folder of images.
#[derive(Debug, Clone, Parser)]
#[command(name = "bbox-annotate", version)]
struct Opts {
    /// folder of images to open at startup
    folder: Option<PathBuf>,
    /// configuration file
    #[arg(long, default_value = "bbox-annotate.toml")]
    config: PathBuf,
    /// annotation file, overrides the configuration
    #[arg(long)]
    store: Option<PathBuf>,
    /// class list file, overrides the configuration
    #[arg(long)]
    classes: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    let mut config = Config::load(&opts.config)
        .with_context(|| format!("failed to load {}", opts.config.display()))?;
    if let Some(store) = opts.store {
        config.store_path = store;
    }
    if let Some(classes) = opts.classes {
        config.class_list = classes;
    }
    info!("Annotations go to {}", config.store_path.display());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("bbox-annotate"),
        ..Default::default()
    };

    let folder = opts.folder;
    eframe::run_native(
        "bbox-annotate",
        options,
        Box::new(move |_cc| Ok(Box::new(app::AnnotateApp::new(config, folder)))),
    )
    .map_err(|e| anyhow!("failed to run eframe: {e}"))
}
