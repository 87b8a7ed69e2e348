//! canvas-reader CLI
//!
//! Reads the text drawn on a page's canvas with OCR and fills the nearest
//! text field. Pages are described by JSON snapshots (see `reader_core::page`).
//!
//! Copyright (c) 2025 Michael A Wright

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use llm_bridge::{OllamaConfig, VisionOcrEngine};
use reader_core::preprocess::{binarize, encode_png, to_data_url, upscale};
use reader_core::{
    ExtractedText, JsonFileStore, OcrEngine, Page, PageHost, ReadOutcome, ReaderConfig,
    ReaderContext, ReaderHandle, ReaderRequest, ResultSink, Status, StatusBoard, StatusSink,
    TesseractEngine,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

#[allow(dead_code)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("BUILT_GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILT_TIME_UTC"),
    ")"
);

/// Results younger than this are shown with their age
const RECENT_SECS: i64 = 30;

#[derive(Parser)]
#[command(name = "canvas-reader")]
#[command(version = built_info::PKG_VERSION, long_version = LONG_VERSION)]
#[command(about = "Read text from a canvas with OCR and fill the nearest input", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EngineKind {
    /// Local Tesseract install
    Tesseract,
    /// Vision model served by Ollama
    Vision,
}

#[derive(clap::Args)]
struct EngineArgs {
    /// OCR engine
    #[arg(short, long, value_enum, default_value = "tesseract")]
    engine: EngineKind,

    /// OCR language
    #[arg(long)]
    lang: Option<String>,

    /// Directory containing Tesseract traineddata files
    #[arg(long)]
    tessdata: Option<PathBuf>,

    /// File holding the last extracted text
    #[arg(long, default_value = ".canvas-reader/last.json")]
    store: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the best canvas on a page snapshot and fill the nearest field
    Read {
        /// Page snapshot (JSON)
        #[arg(short, long)]
        page: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the last extracted text
    Last {
        /// File holding the last extracted text
        #[arg(long, default_value = ".canvas-reader/last.json")]
        store: PathBuf,
    },

    /// Forget the last extracted text
    Clear {
        /// File holding the last extracted text
        #[arg(long, default_value = ".canvas-reader/last.json")]
        store: PathBuf,
    },

    /// Run only the preprocessing step on an image
    Preprocess {
        /// Input image
        #[arg(short, long)]
        input: PathBuf,

        /// Output PNG
        #[arg(short, long)]
        output: PathBuf,

        /// Also print the result as a data URL
        #[arg(long)]
        data_url: bool,
    },

    /// Answer JSON-lines requests from stdin against one page snapshot
    Session {
        /// Page snapshot (JSON)
        #[arg(short, long)]
        page: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

/// Prints status text as it arrives
struct ConsoleStatus {
    to_stderr: bool,
}

impl StatusSink for ConsoleStatus {
    fn show(&mut self, status: Status) {
        tracing::debug!(?status, "status");
        if self.to_stderr || status.is_error() {
            eprintln!("{}", status);
        } else {
            println!("{}", status);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Read { page, engine, json } => read_command(&page, &engine, json).await,
        Commands::Last { store } => last_command(&store),
        Commands::Clear { store } => {
            JsonFileStore::new(store).clear()?;
            println!("{}", Status::Cleared);
            Ok(())
        }
        Commands::Preprocess {
            input,
            output,
            data_url,
        } => preprocess_command(&input, &output, data_url),
        Commands::Session { page, engine } => session_command(&page, &engine).await,
    }
}

fn reader_config(args: &EngineArgs) -> Result<ReaderConfig> {
    let mut config = ReaderConfig::from_env()?;
    if let Some(lang) = &args.lang {
        config.language = lang.clone();
    }
    if let Some(dir) = &args.tessdata {
        config.tessdata_dir = Some(dir.clone());
    }
    Ok(config)
}

fn build_engine(kind: EngineKind, config: &ReaderConfig) -> Result<Box<dyn OcrEngine>> {
    let engine: Box<dyn OcrEngine> = match kind {
        EngineKind::Tesseract => Box::new(TesseractEngine::from_config(config)),
        EngineKind::Vision => Box::new(VisionOcrEngine::from_config(OllamaConfig::from_env()?)?),
    };
    Ok(engine)
}

fn build_reader(args: &EngineArgs, to_stderr: bool) -> Result<ReaderContext> {
    let config = reader_config(args)?;
    let engine = build_engine(args.engine, &config)?;
    Ok(ReaderContext::new(
        engine,
        Box::new(StatusBoard::new(ConsoleStatus { to_stderr })),
        Box::new(JsonFileStore::new(&args.store)),
        config,
    ))
}

async fn read_command(page_path: &Path, args: &EngineArgs, json: bool) -> Result<()> {
    let mut page = Page::load(page_path)?;
    let mut reader = build_reader(args, json)?;

    let outcome = reader.read(&mut page).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let ReadOutcome::Filled { field, .. } = &outcome {
        if let Some(filled) = page.fields().iter().find(|f| f.node == *field) {
            println!(
                "Field {} ({:?}) = {:?}",
                filled.node.0, filled.kind, filled.value
            );
        }
    }

    match outcome {
        ReadOutcome::EngineUnavailable { message } | ReadOutcome::RecognitionFailed { message } => {
            anyhow::bail!(message)
        }
        _ => Ok(()),
    }
}

fn last_command(store: &Path) -> Result<()> {
    match JsonFileStore::new(store).load()? {
        Some(result) => {
            println!("{}", result.text);
            if let Some(age) = describe_recent(&result, chrono::Utc::now()) {
                println!("{}", age);
            }
        }
        None => println!("No text extracted yet. Run `canvas-reader read`."),
    }
    Ok(())
}

fn describe_recent(result: &ExtractedText, now: chrono::DateTime<chrono::Utc>) -> Option<String> {
    let secs = result.age(now).num_seconds();
    (secs < RECENT_SECS).then(|| format!("Text extracted {} seconds ago.", secs))
}

fn preprocess_command(input: &Path, output: &Path, data_url: bool) -> Result<()> {
    let config = ReaderConfig::from_env()?;
    let image = image::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?
        .to_rgba8();

    let scaled = upscale(&image, config.scale_factor)?;
    let binary = binarize(&scaled, config.threshold);
    let png = encode_png(&binary)?;
    std::fs::write(output, &png)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} ({}x{}) -> {} ({}x{})",
        input.display(),
        image.width(),
        image.height(),
        output.display(),
        binary.width(),
        binary.height()
    );
    if data_url {
        println!("{}", to_data_url(&png));
    }
    Ok(())
}

async fn session_command(page_path: &Path, args: &EngineArgs) -> Result<()> {
    let mut page = Page::load(page_path)?;
    let mut reader = build_reader(args, true)?;
    if let Err(e) = reader.warm_up().await {
        tracing::warn!("{}", e);
    }
    let handle = ReaderHandle::new(reader);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: ReaderRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("invalid request: {}", e);
                continue;
            }
        };
        let response = handle.handle(request, &mut page).await;
        println!("{}", serde_json::to_string(&response)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_describe_recent() {
        let result = ExtractedText::now("AB12");
        let now = result.timestamp + chrono::Duration::seconds(12);
        assert_eq!(
            describe_recent(&result, now).as_deref(),
            Some("Text extracted 12 seconds ago.")
        );
        let later = result.timestamp + chrono::Duration::seconds(45);
        assert!(describe_recent(&result, later).is_none());
    }

    #[test]
    fn test_read_args_parse() {
        let cli = Cli::try_parse_from([
            "canvas-reader",
            "read",
            "--page",
            "page.json",
            "--engine",
            "vision",
            "--lang",
            "deu",
        ])
        .unwrap();
        match cli.command {
            Commands::Read { page, engine, json } => {
                assert_eq!(page, PathBuf::from("page.json"));
                assert_eq!(engine.engine, EngineKind::Vision);
                assert_eq!(engine.lang.as_deref(), Some("deu"));
                assert!(!json);
            }
            _ => panic!("expected read command"),
        }
    }

    #[test]
    fn test_preprocess_command_writes_double_size_png() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        image::RgbaImage::from_pixel(30, 12, image::Rgba([40, 40, 40, 255]))
            .save(&input)
            .unwrap();

        preprocess_command(&input, &output, false).unwrap();

        let out = image::open(&output).unwrap();
        assert_eq!((out.width(), out.height()), (60, 24));
    }
}
