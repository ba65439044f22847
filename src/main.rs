use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{info, warn};

use manga_page_translator::queue::QueueEvent;
use manga_page_translator::translate::context::ContextStore;
use manga_page_translator::{Pipeline, TextDirection, TranslateQueue, load_settings, server};

#[derive(Parser, Debug)]
#[command(
    name = "manga-page-translator",
    version,
    about = "Translate manga and comic pages in place"
)]
struct Cli {
    /// Image file to translate; reads stdin when omitted
    #[arg(short = 'd', long = "data")]
    data: Option<PathBuf>,

    /// Output file for the translated page; writes stdout when omitted
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Run the HTTP ingress server instead of a one-shot translation
    #[arg(long = "serve")]
    serve: bool,

    /// Server bind address
    #[arg(long = "addr", default_value = "127.0.0.1:8787")]
    addr: String,

    /// Directory where the server writes translated pages
    #[arg(long = "out-dir", default_value = "translated")]
    out_dir: PathBuf,

    /// Source language override (e.g. "Japanese")
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// Target language override (e.g. "English")
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Text direction override: "horizontal" or "vertical"
    #[arg(long = "direction")]
    direction: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    manga_page_translator::logging::init(cli.verbose)?;

    let mut settings = load_settings(cli.read_settings.as_deref())?;
    if let Some(language) = &cli.source_lang {
        settings.source_language = language.clone();
    }
    if let Some(language) = &cli.lang {
        settings.target_language = language.clone();
    }
    if let Some(direction) = &cli.direction {
        settings.text_direction = TextDirection::parse(direction)
            .ok_or_else(|| anyhow!("unknown text direction: {}", direction))?;
    }

    let context = ContextStore::new();
    let pipeline = Arc::new(Pipeline::from_settings(&settings, context.clone()));

    if cli.serve {
        return serve(pipeline, context, cli.addr, cli.out_dir).await;
    }

    let image = read_input(cli.data.as_deref())?;
    let rendered = pipeline.run(&image, None).await?;
    write_output(cli.out.as_deref(), &rendered)
}

async fn serve(
    pipeline: Arc<Pipeline>,
    context: ContextStore,
    addr: String,
    out_dir: PathBuf,
) -> Result<()> {
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;

    let (queue, mut events) = TranslateQueue::start(pipeline, context);
    let sink_dir = out_dir.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                QueueEvent::Completed { hash, image } => {
                    let path = sink_dir.join(format!("{}.png", hash));
                    match std::fs::write(&path, &image) {
                        Ok(()) => info!(path = %path.display(), "translated page written"),
                        Err(err) => warn!("failed to write translated page: {}", err),
                    }
                }
                QueueEvent::Failed { hash, message } => {
                    warn!(%hash, "page translation failed: {}", message);
                }
            }
        }
    });

    server::run_server(queue, addr).await
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read image: {}", path.display())),
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .with_context(|| "failed to read image from stdin")?;
            if buffer.is_empty() {
                return Err(anyhow!("stdin is empty"));
            }
            Ok(buffer)
        }
    }
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("failed to write output: {}", path.display())),
        None => {
            io::stdout()
                .write_all(bytes)
                .with_context(|| "failed to write output to stdout")?;
            Ok(())
        }
    }
}
