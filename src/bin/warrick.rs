//! CLI for Warrick - prompt-to-image generation with a local history.

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warrick::{
    AspectRatio, ControllerConfig, Credentials, CycleOutcome, FileStorage, GeminiProvider,
    GeneratedImage, GenerationController, GenerationMode, HistoryStore, ImageProvider, KeySelector,
    WarrickError,
};

#[derive(Parser)]
#[command(name = "warrick")]
#[command(about = "Generate images from text prompts with Gemini and keep a local history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// History file (defaults to $WARRICK_HISTORY_PATH or the user data dir)
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a text prompt
    Generate(GenerateArgs),

    /// Inspect or clear the local history
    #[command(subcommand)]
    History(HistoryCommand),

    /// List generation modes and the models they use
    Models {
        /// Probe each model with the configured API key
        #[arg(long)]
        check: bool,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Aspect ratio
    #[arg(long, value_enum, default_value = "1:1")]
    aspect_ratio: AspectRatioArg,

    /// Quality mode
    #[arg(short, long, value_enum, default_value = "fast")]
    mode: ModeArg,

    /// Also write the stored image to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Ask for an API key on stdin when one is needed
    #[arg(long)]
    select_key: bool,
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List stored images, newest first
    List,

    /// Show one stored image
    Show {
        /// Entry id
        id: String,

        /// Write the image to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete all stored images
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "4:3")]
    Wide,
    #[value(name = "3:4")]
    Tall,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Wide => AspectRatio::Wide,
            AspectRatioArg::Tall => AspectRatio::Tall,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Fast,
    Thinking,
    Pro,
}

impl From<ModeArg> for GenerationMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Fast => GenerationMode::Fast,
            ModeArg::Thinking => GenerationMode::Thinking,
            ModeArg::Pro => GenerationMode::Pro,
        }
    }
}

/// Reads an API key from the terminal.
struct TerminalKeySelector {
    credentials: Credentials,
}

#[async_trait]
impl KeySelector for TerminalKeySelector {
    async fn has_selected_api_key(&self) -> bool {
        self.credentials.has_selected()
    }

    async fn open_select_key(&self) -> warrick::Result<()> {
        eprint!("Paste a Gemini API key: ");
        std::io::stderr().flush()?;

        let mut line = String::new();
        tokio::io::BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        if line.trim().is_empty() {
            return Err(WarrickError::Config("no API key entered".into()));
        }
        self.credentials.select(line);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let storage = match cli.history.clone() {
        Some(path) => FileStorage::new(path),
        None => FileStorage::from_env(),
    };
    tracing::debug!(path = %storage.path().display(), "using history file");

    match cli.command {
        Commands::Generate(args) => generate(args, storage, cli.json).await?,
        Commands::History(cmd) => history(cmd, storage, cli.json)?,
        Commands::Models { check } => list_models(check, cli.json).await?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("warrick={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn generate(args: GenerateArgs, storage: FileStorage, json_output: bool) -> anyhow::Result<()> {
    let credentials = Credentials::new();
    let provider = GeminiProvider::builder()
        .credentials(credentials.clone())
        .build()?;

    let mut controller = GenerationController::new(
        provider,
        HistoryStore::load(storage),
        ControllerConfig::from_env(),
    );
    if args.select_key {
        controller = controller.with_key_selector(Arc::new(TerminalKeySelector { credentials }));
    }

    controller.set_prompt(&args.prompt);
    controller.set_aspect_ratio(args.aspect_ratio.into());
    controller.set_mode(args.mode.into());

    let progress = (!json_output).then(|| {
        let mut rx = controller.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                if snapshot.phase.is_in_flight() {
                    eprint!("\rSynthesizing {:>3.0}%", snapshot.progress);
                    let _ = std::io::stderr().flush();
                }
            }
        })
    });

    let outcome = controller.generate().await;
    if let Some(task) = progress {
        task.abort();
        eprintln!();
    }

    let entry = match outcome {
        Ok(CycleOutcome::Committed(entry)) => entry,
        Ok(CycleOutcome::EmptyPrompt) => anyhow::bail!("prompt is empty"),
        Ok(other) => anyhow::bail!("generation did not complete: {other:?}"),
        Err(e) if e.is_authorization() && !args.select_key => {
            anyhow::bail!("{e} (re-run with --select-key to enter a different API key)")
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(ref output) = args.output {
        entry.payload()?.save(output)?;
    }

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "id": entry.id,
            "prompt": entry.prompt,
            "aspect_ratio": entry.aspect_ratio.as_str(),
            "mode": GenerationMode::from(args.mode).as_str(),
            "timestamp": entry.timestamp,
            "output": args.output.as_ref().map(|p| p.display().to_string()),
            "history_len": controller.history().len(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Stored image {} ({})", entry.id, entry.aspect_ratio);
        if let Some(output) = args.output {
            println!("Saved to {}", output.display());
        }
    }

    Ok(())
}

fn history(cmd: HistoryCommand, storage: FileStorage, json_output: bool) -> anyhow::Result<()> {
    let mut store = HistoryStore::load(storage);

    match cmd {
        HistoryCommand::List => {
            if json_output {
                let rows: Vec<_> = store.entries().iter().map(entry_summary).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if store.is_empty() {
                println!("No images stored.");
            } else {
                for entry in store.entries() {
                    let when = entry
                        .created_at()
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!(
                        "{}  {:>4}  {}  {}",
                        entry.id,
                        entry.aspect_ratio.as_str(),
                        when,
                        entry.prompt
                    );
                }
            }
        }
        HistoryCommand::Show { id, output } => {
            let entry = store
                .get(&id)
                .ok_or_else(|| anyhow::anyhow!("no history entry with id {id}"))?;
            let payload = entry.payload()?;
            if let Some(ref path) = output {
                payload.save(path)?;
            }
            if json_output {
                let mut row = entry_summary(entry);
                row["size_bytes"] = payload.size().into();
                println!("{}", serde_json::to_string_pretty(&row)?);
            } else {
                println!("Id:           {}", entry.id);
                println!("Prompt:       {}", entry.prompt);
                println!("Aspect ratio: {}", entry.aspect_ratio);
                println!("Size:         {} bytes ({})", payload.size(), payload.format.extension());
                if let Some(path) = output {
                    println!("Saved to      {}", path.display());
                }
            }
        }
        HistoryCommand::Clear => {
            let removed = store.len();
            store.clear();
            if json_output {
                println!("{}", serde_json::json!({ "removed": removed }));
            } else {
                println!("Removed {} image(s).", removed);
            }
        }
    }

    Ok(())
}

fn entry_summary(entry: &GeneratedImage) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id,
        "prompt": entry.prompt,
        "aspect_ratio": entry.aspect_ratio.as_str(),
        "timestamp": entry.timestamp,
    })
}

async fn list_models(check: bool, json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ModeInfo {
        mode: &'static str,
        model: &'static str,
        needs_key_selection: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reachable: Option<bool>,
    }

    let mut modes: Vec<_> = [GenerationMode::Fast, GenerationMode::Thinking, GenerationMode::Pro]
        .into_iter()
        .map(|mode| ModeInfo {
            mode: mode.as_str(),
            model: mode.model().as_str(),
            needs_key_selection: mode == GenerationMode::Pro,
            reachable: None,
        })
        .collect();

    if check {
        let provider = GeminiProvider::builder().build()?;
        for m in &mut modes {
            let result = provider.health_check(m.model).await;
            if let Err(ref e) = result {
                tracing::warn!(model = m.model, error = %e, "health check failed");
            }
            m.reachable = Some(result.is_ok());
        }
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&modes)?);
    } else {
        println!("Modes:\n");
        for m in &modes {
            let note = if m.needs_key_selection { " (may ask for a key)" } else { "" };
            let status = match m.reachable {
                Some(true) => "  ok",
                Some(false) => "  unreachable",
                None => "",
            };
            println!("  {:<9} {}{}{}", m.mode, m.model, note, status);
        }
        println!("\nAPI key: API_KEY, GEMINI_API_KEY or GOOGLE_API_KEY");
    }

    Ok(())
}
