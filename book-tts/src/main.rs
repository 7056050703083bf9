//! book-tts - Clean book text with an LLM and synthesize it with SpeechKit v3

mod batch;
mod clean;
mod config;
mod jsonl;
mod pieces;
mod text;
mod tts;

use anyhow::{Context, Result};
use batch::BatchOptions;
use clap::{Parser, Subcommand};
use clean::{Cleaner, StageLimits};
use config::BookTtsConfig;
use log::{debug, error, info};
use std::path::PathBuf;
use std::time::Duration;
use tts::{Container, Credentials, HttpTransport, RetryPolicy, SpeechKitClient};

#[derive(Parser, Debug)]
#[command(name = "book-tts")]
#[command(about = "Clean book text with an LLM, split it for TTS and synthesize it with SpeechKit v3", long_about = None)]
#[command(version)]
struct Args {
    /// Enable debug output
    #[arg(short, long, default_value_t = false, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean the book with the LLM, then split it into TTS pieces
    Clean {
        /// Raw book text (default: book_path from config)
        #[arg(long)]
        book: Option<PathBuf>,

        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// LLM preset from llm.toml
        #[arg(long)]
        preset: Option<String>,

        /// Model name overriding the preset (falls back to OPENAI_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Token budget per cleaning request
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Character budget per TTS piece
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Hugging Face tokenizer.json for exact token counts
        #[arg(long)]
        tokenizer: Option<PathBuf>,
    },
    /// Re-split an existing cleaned text into TTS pieces
    Split {
        /// Cleaned text (default: <out-dir>/cleaned_full.txt)
        #[arg(long)]
        cleaned: Option<PathBuf>,

        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Collect piece files into one JSONL manifest
    Jsonl {
        /// Directory of .txt pieces (default: <out-dir>/speechkit_chunks)
        #[arg(long)]
        in_dir: Option<PathBuf>,

        /// Output file (default: <out-dir>/speechkit_chunks.jsonl)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Maximum piece length for validation
        #[arg(long)]
        max_chars: Option<usize>,

        /// Skip the length check
        #[arg(long, default_value_t = false)]
        no_validate: bool,
    },
    /// Synthesize every piece file with SpeechKit
    Synth(SynthArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct SynthArgs {
    /// Directory of .txt pieces (default: <out-dir>/speechkit_chunks)
    #[arg(long)]
    in_dir: Option<PathBuf>,

    /// Where audio files go (default: <out-dir>/audio)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    #[arg(long)]
    voice: Option<String>,

    /// Optional speaking role
    #[arg(long)]
    role: Option<String>,

    #[arg(long)]
    speed: Option<f32>,

    /// WAV, OGG_OPUS or MP3
    #[arg(long)]
    container: Option<Container>,

    /// Pause between requests, seconds
    #[arg(long)]
    sleep: Option<f64>,

    /// Synthesize at most N files. 0 = all
    #[arg(long, default_value_t = 0)]
    limit: usize,

    /// First file number to synthesize (1 = 00001.txt)
    #[arg(long, default_value_t = 1)]
    start: u64,

    /// Total attempts per piece
    #[arg(long)]
    retries: Option<u32>,

    /// Per-request timeout, seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// SpeechKit API key (falls back to SPEECHKIT_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// IAM token (falls back to IAM_TOKEN)
    #[arg(long)]
    iam_token: Option<String>,

    /// Folder id, required with an IAM token (falls back to FOLDER_ID)
    #[arg(long)]
    folder_id: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set default output directory
    SetOutDir { path: PathBuf },
    /// Set default book path
    SetBook { path: PathBuf },
    /// Set default LLM preset
    SetPreset { name: String },
    /// Set tokenizer.json for exact token counts
    SetTokenizer { path: PathBuf },
    /// Set default voice
    SetVoice { voice: String },
    /// Set default role ("" clears it)
    SetRole { role: String },
    /// Set default speed
    SetSpeed { value: f32 },
    /// Set default container (WAV, OGG_OPUS, MP3)
    SetContainer { container: Container },
}

/// CLI value, else the environment variable. Blank values count as unset.
fn flag_or_env(flag: &Option<String>, var: &str) -> Option<String> {
    flag_or(flag, std::env::var(var).ok())
}

fn flag_or(flag: &Option<String>, fallback: Option<String>) -> Option<String> {
    let present = |value: &String| !value.trim().is_empty();
    flag.clone().filter(present).or_else(|| fallback.filter(present))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let file_config = BookTtsConfig::load().context("Failed to load configuration")?;
    let config = file_config
        .clone()
        .with_env_overrides(|name| std::env::var(name).ok())?;
    debug!("Configuration: {:?}", config);

    match args.command {
        Commands::Clean {
            book,
            out_dir,
            preset,
            model,
            max_tokens,
            chunk_size,
            tokenizer,
        } => {
            let book = book.unwrap_or_else(|| config.book_path.clone());
            let out_dir = out_dir.unwrap_or_else(|| config.out_dir.clone());
            let limits = StageLimits {
                max_content_tokens: max_tokens.unwrap_or(config.max_content_tokens),
                max_chars: chunk_size.unwrap_or(config.tts_chunk_size),
            };

            let cleaner = build_cleaner(&config, preset.as_deref(), model)?;
            let counter = text::load_counter(tokenizer.or(config.tokenizer_path.clone()).as_deref());

            let report = clean::clean_book(&book, &out_dir, limits, counter.as_ref(), &cleaner)
                .await
                .context("Clean stage failed")?;
            info!(
                "Done: {} chunks cleaned into {} ({} characters), {} pieces in {}",
                report.chunks,
                report.cleaned_path.display(),
                report.cleaned_chars,
                report.pieces,
                report.pieces_dir.display()
            );
        }
        Commands::Split {
            cleaned,
            out_dir,
            chunk_size,
        } => {
            let out_dir = out_dir.unwrap_or_else(|| config.out_dir.clone());
            let cleaned = cleaned.unwrap_or_else(|| out_dir.join(clean::CLEANED_FILE));
            let content = std::fs::read_to_string(&cleaned)
                .with_context(|| format!("Failed to read {}", cleaned.display()))?;
            clean::split_to_pieces(
                &content,
                &out_dir.join(clean::PIECES_DIR),
                chunk_size.unwrap_or(config.tts_chunk_size),
            )?;
        }
        Commands::Jsonl {
            in_dir,
            out,
            max_chars,
            no_validate,
        } => {
            let in_dir = in_dir.unwrap_or_else(|| config.pieces_dir());
            let out = out.unwrap_or_else(|| config.out_dir.join("speechkit_chunks.jsonl"));
            let max_chars = (!no_validate).then(|| max_chars.unwrap_or(config.tts_chunk_size));

            let lines = jsonl::assemble(&in_dir, &out, max_chars)?;
            info!("OK: {} ({} lines)", out.display(), lines);
        }
        Commands::Synth(synth) => {
            let summary = run_synth(&config, &synth).await?;
            if !summary.is_success() {
                error!("{} piece(s) failed:", summary.failures.len());
                for failure in &summary.failures {
                    error!("  {}: {}", failure.name, failure.error);
                }
                std::process::exit(1);
            }
        }
        Commands::Config { action } => {
            handle_config_command(file_config, action)?;
        }
    }

    Ok(())
}

/// Resolve the LLM preset and build the cleaner around it.
fn build_cleaner(config: &BookTtsConfig, preset: Option<&str>, model: Option<String>) -> Result<Cleaner> {
    let llm_config = llm_client::Config::load().context("Failed to load LLM configuration")?;
    let mut preset = llm_config
        .resolve_preset(preset.or(config.model_preset.as_deref()))?
        .clone();
    if let Some(model) = model.or_else(|| std::env::var("OPENAI_MODEL").ok()) {
        preset.model = model;
    }
    debug!("LLM: {} / {}", preset.provider, preset.model);

    let provider = llm_client::get_provider(&preset, llm_config.get_provider_config(&preset.provider))?;
    Ok(Cleaner::new(provider))
}

async fn run_synth(config: &BookTtsConfig, args: &SynthArgs) -> Result<batch::BatchSummary> {
    let credentials = Credentials::resolve(
        flag_or_env(&args.api_key, "SPEECHKIT_API_KEY").as_deref(),
        flag_or_env(&args.iam_token, "IAM_TOKEN").as_deref(),
        flag_or_env(&args.folder_id, "FOLDER_ID").as_deref(),
    )?;
    info!("Authenticating with {}", credentials.scheme());

    let transport = HttpTransport::new(&credentials, config.speechkit_url.as_deref())?;
    let client = SpeechKitClient::new(transport)
        .with_retry(RetryPolicy::with_attempts(args.retries.unwrap_or(config.retries)))
        .with_timeout(Duration::from_secs(args.timeout.unwrap_or(config.timeout_secs)));

    let mut voice = config.voice_options();
    if let Some(name) = &args.voice {
        voice = voice.with_voice(name.clone());
    }
    if args.role.is_some() {
        voice = voice.with_role(args.role.as_deref());
    }
    if let Some(speed) = args.speed {
        voice = voice.with_speed(speed);
    }
    if let Some(container) = args.container {
        voice = voice.with_container(container);
    }

    let sleep = match args.sleep {
        Some(secs) => Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO),
        None => config.rate_limit(),
    };

    let in_dir = args.in_dir.clone().unwrap_or_else(|| config.pieces_dir());
    let out_dir = args.out_dir.clone().unwrap_or_else(|| config.audio_dir());
    let inputs = batch::select_inputs(&in_dir, args.start, args.limit)?;

    batch::run_batch(&client, &inputs, &out_dir, &BatchOptions { voice, sleep }).await
}

fn handle_config_command(mut config: BookTtsConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Configuration file: {:?}", BookTtsConfig::config_path()?);
            println!("LLM configuration: {:?}", llm_client::Config::config_path()?);
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        ConfigAction::SetOutDir { path } => {
            println!("Default output directory set to: {}", path.display());
            config.out_dir = path;
        }
        ConfigAction::SetBook { path } => {
            println!("Default book set to: {}", path.display());
            config.book_path = path;
        }
        ConfigAction::SetPreset { name } => {
            llm_client::Config::load()?.get_preset(&name)?;
            println!("Default LLM preset set to: {}", name);
            config.model_preset = Some(name);
        }
        ConfigAction::SetTokenizer { path } => {
            if !path.exists() {
                anyhow::bail!("Tokenizer file not found: {}", path.display());
            }
            println!("Tokenizer set to: {}", path.display());
            config.tokenizer_path = Some(path);
        }
        ConfigAction::SetVoice { voice } => {
            println!("Default voice set to: {}", voice);
            config.voice = voice;
        }
        ConfigAction::SetRole { role } => {
            let role = role.trim();
            config.role = (!role.is_empty()).then(|| role.to_string());
            println!("Default role set to: {}", config.role.as_deref().unwrap_or("(none)"));
        }
        ConfigAction::SetSpeed { value } => {
            if value <= 0.0 {
                anyhow::bail!("Speed must be positive");
            }
            config.speed = value;
            println!("Default speed set to: {}", value);
        }
        ConfigAction::SetContainer { container } => {
            config.container = container;
            println!("Default container set to: {}", container);
        }
    }
    config.save()
}
