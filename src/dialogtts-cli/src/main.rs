//! dialogtts CLI - Dialogue to speech
//!
//! Synthesizes every conversation of a JSONL corpus through a TTS service
//! and writes per-turn clips, a combined track and a manifest per dialogue.

use clap::Parser;
use colored::Colorize;
use dialogtts_core::{
    Config, ConversationOrchestrator, HttpSynthesizer, PipelineEvent, RandomSelector,
    ReferenceCatalog, SynthesisMode, VoiceSelector, config::DEFAULT_API_KEY,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dialogtts",
    version,
    about = "Generate paired speech audio from JSONL dialogue data",
    long_about = "Synthesizes each conversation turn through a TTS service, then merges the \
                  user and assistant clips into one alternating track per conversation."
)]
struct Cli {
    /// Path to the input JSONL file containing dialogue data
    #[arg(long = "jsonl_file_path", value_name = "PATH")]
    jsonl_file_path: PathBuf,

    /// Directory whose subfolders are the available reference voices
    #[arg(long = "reference_dir", value_name = "DIR")]
    reference_dir: PathBuf,

    /// Directory where conversation folders are written
    #[arg(long = "output_dir", value_name = "DIR")]
    output_dir: PathBuf,

    /// Send all turns of a speaker in one batch request
    #[arg(long)]
    batch: bool,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seed for voice selection
    #[arg(long, value_name = "SEED", conflicts_with = "no_seed")]
    seed: Option<u64>,

    /// Pick voices from system entropy instead of a fixed seed
    #[arg(long)]
    no_seed: bool,

    /// Single-turn synthesis endpoint
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Batch synthesis endpoint
    #[arg(long, value_name = "URL")]
    batch_api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &cli);

    if config.service.api_key == DEFAULT_API_KEY {
        eprintln!(
            "{}",
            "Warning: DIALOGTTS_API_KEY not set, using the placeholder key.".yellow()
        );
    }

    let catalog = ReferenceCatalog::load_non_empty(&cli.reference_dir)?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  dialogtts - Dialogue to Speech".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Input:".bold(), cli.jsonl_file_path.display());
    println!("{} {}", "Output:".bold(), cli.output_dir.display());
    println!(
        "{} {} voices in {}",
        "References:".bold(),
        catalog.len(),
        catalog.root().display()
    );
    let endpoint = match config.synthesis.mode {
        SynthesisMode::Single => &config.service.single_url,
        SynthesisMode::Batch => &config.service.batch_url,
    };
    println!(
        "{} {} ({})",
        "Service:".bold(),
        endpoint,
        match config.synthesis.mode {
            SynthesisMode::Single => "single-turn",
            SynthesisMode::Batch => "batch",
        }
        .yellow()
    );
    println!("{}", "─".repeat(70).dimmed());

    let selector: Box<dyn VoiceSelector> = match config.run.seed {
        Some(seed) => Box::new(RandomSelector::seeded(seed)),
        None => Box::new(RandomSelector::from_entropy()),
    };
    let synthesizer = HttpSynthesizer::new(&config.service)?;

    let progress = create_progress_bar();
    let mut orchestrator = ConversationOrchestrator::new(
        Box::new(synthesizer),
        catalog,
        config.synthesis.clone(),
        &cli.output_dir,
    )?
    .with_selector(selector)
    .with_callback(create_console_callback(progress.clone()));

    let processed = orchestrator.run(&cli.jsonl_file_path).await?;
    progress.finish_and_clear();

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  Processed {} conversations.", processed)
            .bright_green()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}

/// Layer environment and flag values over the config file.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Ok(key) = env::var("DIALOGTTS_API_KEY") {
        config.service.api_key = key;
    }
    if let Some(url) = &cli.api_url {
        config.service.single_url = url.clone();
    }
    if let Some(url) = &cli.batch_api_url {
        config.service.batch_url = url.clone();
    }
    if cli.batch {
        config.synthesis.mode = SynthesisMode::Batch;
    }
    if cli.no_seed {
        config.run.seed = None;
    } else if cli.seed.is_some() {
        config.run.seed = cli.seed;
    }
}

fn create_progress_bar() -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {pos} conversations {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_spinner());
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

/// Create a callback that prints pipeline events above the progress bar.
fn create_console_callback(
    progress: ProgressBar,
) -> Box<dyn Fn(PipelineEvent) + Send + Sync> {
    Box::new(move |event| match event {
        PipelineEvent::Skipped { id } => {
            progress.println(format!(
                "{} {}",
                "↷".dimmed(),
                format!("Skipping already processed conversation {}", id).dimmed()
            ));
            progress.inc(1);
        }
        PipelineEvent::ConversationStart {
            id,
            user_reference_id,
            assistant_reference_id,
            user_turns,
            assistant_turns,
        } => {
            progress.println(format!(
                "{} {} {}",
                "▶".bright_cyan(),
                id.bright_cyan().bold(),
                format!(
                    "(user: {} turns as {}, assistant: {} turns as {})",
                    user_turns, user_reference_id, assistant_turns, assistant_reference_id
                )
                .dimmed()
            ));
        }
        PipelineEvent::TurnSynthesized {
            id,
            role,
            index,
            total,
        } => {
            progress.set_message(format!("{}: {} turn {}/{}", id, role, index, total));
        }
        PipelineEvent::RoleFailed { id, role, error_log } => {
            progress.println(format!(
                "  {} {} audio failed for {}. Details saved to {}",
                "✗".red().bold(),
                role,
                id,
                error_log.display()
            ));
            progress.inc(1);
        }
        PipelineEvent::Merged {
            path,
            duration_secs,
            ..
        } => {
            progress.println(format!(
                "  Combined audio saved at {} ({:.1}s)",
                path.display(),
                duration_secs
            ));
        }
        PipelineEvent::Completed { manifest_path, .. } => {
            progress.println(format!(
                "  {} JSON saved at {}",
                "✓".bright_green(),
                manifest_path.display()
            ));
            progress.inc(1);
        }
        PipelineEvent::ConversationFailed { id, error } => {
            progress.println(format!(
                "  {} {} {}",
                "Error:".red().bold(),
                id,
                error
            ));
            progress.inc(1);
        }
        PipelineEvent::InvalidRecord { line, error } => {
            progress.println(format!(
                "{} line {}: {}",
                "Skipping invalid record".yellow(),
                line,
                error
            ));
        }
    })
}
