//! CLI for Nexus Art - turn words into images from the terminal.

use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use nexus_art::{
    Completion, Completions, Config, GenerationClient, GenerationStatus, ImageProviderKind,
    RenderedImage, SubmitOutcome,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "nexus-art")]
#[command(about = "Dream It. Generate It. Text-to-image via Stability AI or Clipdrop")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Provider to use (overrides NEXUS_PROVIDER)
    #[arg(short, long, global = true, value_enum)]
    provider: Option<ProviderArg>,

    /// HTTP timeout in seconds (overrides NEXUS_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Type prompts, press Enter to generate (default)
    Interactive,

    /// Generate a single image and save it
    Generate(GenerateArgs),

    /// List available providers
    Providers,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Output file or directory (defaults to nexus-art.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Stability,
    Clipdrop,
}

impl From<ProviderArg> for ImageProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Stability => ImageProviderKind::Stability,
            ProviderArg::Clipdrop => ImageProviderKind::Clipdrop,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // A missing .env file is fine; the keys may come from the environment.
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let mut config = Config::from_env()?;
    if let Some(provider) = cli.provider {
        config = config.with_provider(provider.into());
    }
    if let Some(secs) = cli.timeout {
        if secs == 0 {
            anyhow::bail!("--timeout must be greater than zero");
        }
        config = config.with_timeout(Duration::from_secs(secs));
    }

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Interactive => run_interactive(&config).await?,
        Commands::Generate(args) => generate_once(&config, args, cli.json).await?,
        Commands::Providers => list_providers(&config, cli.json)?,
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Alert that also remembers the last message for JSON output.
fn alert_sink() -> (Arc<Mutex<Option<String>>>, impl nexus_art::Notifier + 'static) {
    let last = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&last);
    let notifier = move |message: &str| {
        eprintln!("\n  ⚠  {message}\n");
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(message.to_string());
        }
    };
    (last, notifier)
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message("Creating...");
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn print_banner(provider: &str) {
    println!("NEXUS ART  ·  {provider}");
    println!();
    println!("Dream It. Generate It.");
    println!("Turn words into stunning visuals with the power of AI.");
    println!();
    println!("  Lightning Fast  ·  High Res 1024x1024  ·  Unlimited");
    println!();
    println!("Type a prompt and press Enter. Commands: :download [path], :cancel, :status, :quit");
}

fn print_image(image: &RenderedImage) {
    const PREVIEW: usize = 64;
    let src = image.src();
    let shown = match src.get(..PREVIEW) {
        Some(head) if src.len() > PREVIEW => format!("{head}..."),
        _ => src.to_string(),
    };
    let generated = image.image();
    println!(
        "Image ready via {} ({} bytes, {})",
        generated.provider,
        generated.size(),
        generated.format.extension()
    );
    println!("  src: {shown}");
    println!("  :download to save as {}", image.download_filename());
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Prompt(String),
    Download(Option<PathBuf>),
    Cancel,
    Status,
    Quit,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let Some(command) = line.strip_prefix(':') else {
            return Self::Prompt(line.to_string());
        };
        let mut parts = command.trim().splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
        match name {
            "download" | "d" => Self::Download(arg.map(PathBuf::from)),
            "cancel" => Self::Cancel,
            "status" => Self::Status,
            "quit" | "q" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

async fn run_interactive(config: &Config) -> anyhow::Result<()> {
    let provider = config.build_provider()?;
    print_banner(provider.name());

    let (_last_alert, notifier) = alert_sink();
    let (mut client, mut completions) = GenerationClient::new(provider, notifier);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut progress: Option<ProgressBar> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Input::parse(&line) {
                    Input::Prompt(text) => {
                        client.set_prompt(text);
                        match client.submit() {
                            SubmitOutcome::Dispatched(_) => progress = Some(spinner()),
                            SubmitOutcome::Busy => eprintln!("Still creating the previous image..."),
                            SubmitOutcome::EmptyPrompt => {}
                        }
                    }
                    Input::Download(target) => match client.download(target.as_deref()) {
                        Ok(path) => println!("Saved {}", path.display()),
                        Err(e) => eprintln!("Download failed: {e}"),
                    },
                    Input::Cancel => {
                        if client.cancel() {
                            if let Some(bar) = progress.take() {
                                bar.finish_and_clear();
                            }
                            println!("Cancelled.");
                        }
                    }
                    Input::Status => println!("Status: {}", client.status()),
                    Input::Quit => break,
                    Input::Unknown(name) => eprintln!("Unknown command :{name}"),
                }
            }
            Some(completion) = completions.recv() => {
                if apply_completion(&mut client, completion, &mut progress) {
                    if let Some(image) = client.image() {
                        print_image(image);
                    }
                }
            }
        }
    }

    if let Some(bar) = progress.take() {
        bar.finish_and_clear();
    }
    client.cancel();
    Ok(())
}

/// Applies a completion, clearing the spinner first so an alert never
/// lands on a line the spinner is still redrawing.
fn apply_completion(
    client: &mut GenerationClient,
    completion: Completion,
    progress: &mut Option<ProgressBar>,
) -> bool {
    if client.in_flight() == Some(completion.id()) {
        if let Some(bar) = progress.take() {
            bar.finish_and_clear();
        }
    }
    client.complete(completion)
}

async fn settle(
    client: &mut GenerationClient,
    completions: &mut Completions,
    progress: &mut Option<ProgressBar>,
) -> GenerationStatus {
    while client.in_flight().is_some() {
        match completions.recv().await {
            Some(completion) => {
                apply_completion(client, completion, progress);
            }
            None => break,
        }
    }
    if let Some(bar) = progress.take() {
        bar.finish_and_clear();
    }
    client.status()
}

async fn generate_once(config: &Config, args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let provider = config.build_provider()?;
    let (last_alert, notifier) = alert_sink();
    let (mut client, mut completions) = GenerationClient::new(provider, notifier);

    client.set_prompt(args.prompt);
    if client.submit() == SubmitOutcome::EmptyPrompt {
        anyhow::bail!("prompt must not be empty");
    }

    let mut progress = (!json_output).then(spinner);
    let status = settle(&mut client, &mut completions, &mut progress).await;

    let image = match (status, client.image()) {
        (GenerationStatus::Done, Some(image)) => image,
        _ => {
            let message = last_alert
                .lock()
                .ok()
                .and_then(|m| m.clone())
                .unwrap_or_else(|| "generation failed".to_string());
            if json_output {
                let result = serde_json::json!({
                    "success": false,
                    "provider": client.provider_kind().to_string(),
                    "error": message,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            anyhow::bail!(message);
        }
    };

    let path = client.download(args.output.as_deref())?;
    let generated = image.image();

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "output": path.display().to_string(),
            "size_bytes": generated.size(),
            "format": generated.format.extension(),
            "provider": generated.provider.to_string(),
            "model": generated.metadata.model,
            "duration_ms": generated.metadata.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated image: {} ({} bytes) via {}",
            path.display(),
            generated.size(),
            generated.provider
        );
        if let Some(duration) = generated.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }

    Ok(())
}

fn list_providers(config: &Config, json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        kind: String,
        env_var: &'static str,
        enabled: bool,
        configured: bool,
        selected: bool,
    }

    let providers: Vec<ProviderInfo> = ImageProviderKind::ALL
        .iter()
        .map(|kind| ProviderInfo {
            name: kind.display_name(),
            kind: kind.to_string(),
            env_var: kind.env_var(),
            enabled: match kind {
                ImageProviderKind::Stability => cfg!(feature = "stability"),
                ImageProviderKind::Clipdrop => cfg!(feature = "clipdrop"),
            },
            configured: config.api_key(*kind).is_some(),
            selected: config.provider == *kind,
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Available providers:\n");
        for p in &providers {
            let status = if p.enabled { "✓" } else { "✗" };
            let selected = if p.selected { " [selected]" } else { "" };
            println!("  {} {} ({}){}", status, p.name, p.kind, selected);
            let key = if p.configured { "set" } else { "not set" };
            println!("    API key: {} ({})", p.env_var, key);
        }
    }

    Ok(())
}
