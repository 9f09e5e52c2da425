//! Diagnose leaf photos from the command line, without the HTTP server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::error;

use leafcheck::config::PipelineArgs;
use leafcheck::diagnosis::DiagnosisResult;
use leafcheck::store::{DiseaseInfoStore, MemoryStore, PesticideStore, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "leafcheck-diagnose", version, about)]
struct Cli {
    /// Images to diagnose
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Curated SQLite database; sample reference data is used when omitted
    #[arg(long, env = "DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Print one JSON object per image
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

fn guess_content_type(path: &std::path::Path) -> Option<&'static str> {
    use image::ImageFormat;

    let mime = match ImageFormat::from_path(path).ok()? {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        _ => "image/*",
    };
    Some(mime)
}

fn print_human(path: &std::path::Path, result: &DiagnosisResult) {
    println!("Image: {}", path.display());
    println!("  Prediction: {} / {}", result.plant, result.disease);
    println!(
        "  Confidence: {:.2}%{}",
        result.confidence,
        if result.synthetic { " (synthetic)" } else { "" }
    );
    println!("  Symptoms:   {}", result.symptoms);
    println!("  Treatment:  {}", result.treatment);
    println!("  Prevention: {}", result.prevention);
    for (i, p) in result.pesticides.iter().enumerate() {
        println!(
            "  {}. {} ({}) - {} @ {:.2}",
            i + 1,
            p.name,
            p.kind,
            p.application_rate,
            p.price
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    leafcheck::init_tracing();

    let (pesticides, diseases): (Arc<dyn PesticideStore>, Arc<dyn DiseaseInfoStore>) =
        match &cli.database {
            Some(path) => {
                let store = Arc::new(
                    SqliteStore::open(path)
                        .with_context(|| format!("failed to open {}", path.display()))?,
                );
                (
                    store.clone() as Arc<dyn PesticideStore>,
                    store as Arc<dyn DiseaseInfoStore>,
                )
            }
            None => {
                let store = Arc::new(MemoryStore::seeded());
                (
                    store.clone() as Arc<dyn PesticideStore>,
                    store as Arc<dyn DiseaseInfoStore>,
                )
            }
        };

    let labels = cli.pipeline.load_labels().await?;
    let classifier = cli.pipeline.load_classifier().await;
    let assembler = cli
        .pipeline
        .build_assembler(labels, classifier, pesticides, diseases)?;

    let mut failures = 0;
    for path in &cli.images {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Image not found: {}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };

        match assembler.diagnose_upload(guess_content_type(path), &bytes) {
            Ok(result) if cli.json => println!("{}", serde_json::to_string(&result)?),
            Ok(result) => print_human(path, &result),
            Err(e) => {
                error!("{}: {} ({})", path.display(), e, e.code());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} images failed", failures, cli.images.len());
    }
    Ok(())
}
