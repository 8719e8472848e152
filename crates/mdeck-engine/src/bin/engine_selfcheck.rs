use std::path::Path;

use tracing_subscriber::EnvFilter;

use mdeck_engine::{ArtifactRegistry, EngineConfig};
use mdeck_media::{build_args, check_ffmpeg};
use mdeck_models::{JobSpec, MediaCategory, OutputFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = EngineConfig::from_env();
    println!(
        "engine-selfcheck: starting with tool={}",
        config.ffmpeg_path.display()
    );

    if let Some(dir) = &config.output_dir {
        ensure_dir(dir).await?;
    }
    let registry = ArtifactRegistry::from_config(&config);
    println!(
        "engine-selfcheck: artifact registry seeded with {} recent file(s)",
        registry.len()
    );

    let resolved = check_ffmpeg()?;
    println!("engine-selfcheck: found tool at {}", resolved.display());

    // Dry-run the builder on a representative spec
    let spec =
        JobSpec::convert(MediaCategory::Video, OutputFormat::Mp4H264).with_input("sample.mov");
    let args = build_args(&spec)?;
    println!("engine-selfcheck: sample command: ffmpeg {}", args.join(" "));

    println!("engine-selfcheck: ok");
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mdeck=info"));
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .init();
    }
}

async fn ensure_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path.as_ref()).await?;
    Ok(())
}
