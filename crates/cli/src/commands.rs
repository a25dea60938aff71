use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use nota_core::{Locale, UploadedFile};
use nota_ocr::{spawn_intake_watcher, ExtractionController, PipelineConfig};
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// PDF or image to read
    pub file: PathBuf,

    /// Declared media type; guessed from the extension when omitted
    #[arg(long)]
    pub media_type: Option<String>,

    /// Document locale (id or en)
    #[arg(long)]
    pub locale: Option<Locale>,
}

#[derive(Args, Debug)]
pub struct CategorizeArgs {
    /// Transaction descriptions
    #[arg(required = true)]
    pub descriptions: Vec<String>,

    /// Dictionary locale (id or en)
    #[arg(long)]
    pub locale: Option<Locale>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Intake directory (defaults to the platform data directory)
    pub dir: Option<PathBuf>,
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "nota", "Nota")
}

/// `--config` if given, else `config.toml` in the platform config directory
/// when it exists, else built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    if let Some(path) = explicit {
        return PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    match project_dirs().map(|d| d.config_dir().join("config.toml")) {
        Some(path) if path.exists() => PipelineConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        _ => Ok(PipelineConfig::default()),
    }
}

#[cfg(feature = "tesseract")]
fn build_controller(config: &PipelineConfig) -> anyhow::Result<ExtractionController> {
    use nota_ocr::recognizer::tesseract_backend::TesseractRecognizer;

    let mut recognizer = TesseractRecognizer::new(config.ocr_languages());
    if let Some(dir) = &config.tessdata_dir {
        recognizer = recognizer.with_tessdata_dir(dir);
    }
    tracing::debug!("OCR languages: {}", config.ocr_languages());
    Ok(config.controller(recognizer)?)
}

#[cfg(not(feature = "tesseract"))]
fn build_controller(config: &PipelineConfig) -> anyhow::Result<ExtractionController> {
    Ok(config.controller(nota_ocr::UnavailableRecognizer)?)
}

pub async fn extract(args: ExtractArgs, mut config: PipelineConfig) -> anyhow::Result<()> {
    if let Some(locale) = args.locale {
        config.locale = locale;
    }
    let mut file = UploadedFile::from_path_with_limit(&args.file, config.max_file_size_bytes)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    if let Some(media_type) = args.media_type {
        file.media_type = media_type;
    }

    let controller = build_controller(&config)?;
    let outcome = controller.select_file(file).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

pub async fn categorize(args: CategorizeArgs, mut config: PipelineConfig) -> anyhow::Result<()> {
    if let Some(locale) = args.locale {
        config.locale = locale;
    }
    let service = config.categorizer()?;
    let categories = service.predict_batch(&args.descriptions).await;
    for (description, category) in args.descriptions.iter().zip(categories) {
        println!("{description}\t{}", category.as_deref().unwrap_or("-"));
    }
    Ok(())
}

pub async fn watch(args: WatchArgs, config: PipelineConfig) -> anyhow::Result<()> {
    let dir = match args.dir {
        Some(dir) => dir,
        None => project_dirs()
            .context("Failed to get app directory")?
            .data_dir()
            .join("intake"),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create intake directory {}", dir.display()))?;

    let controller = build_controller(&config)?;

    // The channel bridges the notify watcher thread and the async processor.
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = spawn_intake_watcher(&dir, tx)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    tracing::info!("Watching {}", dir.display());

    while let Some(path) = rx.recv().await {
        tracing::info!("Processing {}", path.display());
        let file = match UploadedFile::from_path_with_limit(&path, config.max_file_size_bytes).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Could not read {}: {e}", path.display());
                continue;
            }
        };
        match controller.select_file(file).await {
            Ok(outcome) if outcome.success => {
                let json = serde_json::to_string(&outcome.extraction)?;
                tracing::info!("{}: {json}", path.display());
            }
            Ok(outcome) => {
                if let Some(error) = &outcome.error {
                    tracing::warn!("{}: {error}", path.display());
                }
            }
            Err(e) => tracing::warn!("{}: {e}", path.display()),
        }
    }
    Ok(())
}
