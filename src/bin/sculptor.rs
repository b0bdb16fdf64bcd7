//! CLI for Sculptor - marble sculptures from portraits.

use clap::{Args, Parser, Subcommand};
use sculptor::studio::config::{DEFAULT_SEED_URL, QUICK_EDITS};
use sculptor::image::RemoteFetcher;
use sculptor::{
    GenerationClient, ImageProvider, ImageRecord, OperationOutcome, Phase, SeedSource,
    SessionState, Studio, StudioConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Upper bound for a single HTTP exchange (generation calls can be slow).
const HTTP_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Parser)]
#[command(name = "sculptor")]
#[command(about = "Turn portraits into photorealistic marble sculptures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    backend: BackendArgs,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args)]
struct BackendArgs {
    /// Gemini model id (e.g. gemini-2.5-flash-image)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Override the generation endpoint
    #[arg(long, global = true, env = "SCULPTOR_ENDPOINT")]
    endpoint: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an image into a marble sculpture
    Convert {
        /// Input image (PNG, JPEG or WebP)
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Sculpt a random seed image
    Random(RandomArgs),

    /// Convert an image, then apply refinements in order
    Refine {
        /// Input image (PNG, JPEG or WebP)
        input: PathBuf,

        /// Refinement to apply; repeat for several
        #[arg(short, long = "prompt", required = true)]
        prompts: Vec<String>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Interactive session over stdin
    Session(RandomArgs),

    /// Check that the provider is reachable and the key is accepted
    Check,
}

#[derive(Args)]
struct RandomArgs {
    /// Output file path (not used by `session`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fetch the seed from a URL instead of generating it
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_SEED_URL)]
    seed_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let provider = build_provider(&cli.backend, http.clone())?;
    let fetcher = RemoteFetcher::with_client(http);
    let new_studio = |config: StudioConfig| {
        Studio::new(provider.clone(), config).with_fetcher(fetcher.clone())
    };

    match cli.command {
        Commands::Convert { input, output } => {
            let studio = new_studio(StudioConfig::default());
            report(&studio.upload_path(&input).await?, &studio)?;
            save_current(&studio.snapshot(), &output, cli.json)?;
        }
        Commands::Random(args) => {
            let output = args
                .output
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--output is required"))?;
            let studio = new_studio(random_config(&args));
            report(&studio.request_random().await?, &studio)?;
            save_current(&studio.snapshot(), &output, cli.json)?;
        }
        Commands::Refine {
            input,
            prompts,
            output,
        } => {
            let studio = new_studio(StudioConfig::default());
            report(&studio.upload_path(&input).await?, &studio)?;
            for prompt in &prompts {
                report(&studio.refine(prompt).await?, &studio)?;
                if let Some(err) = studio.snapshot().error {
                    anyhow::bail!("refinement \"{prompt}\" failed: {err}");
                }
            }
            save_current(&studio.snapshot(), &output, cli.json)?;
        }
        Commands::Session(args) => {
            let studio = new_studio(random_config(&args));
            run_session(studio).await?;
        }
        Commands::Check => {
            let client = GenerationClient::new(provider.clone());
            client.health_check().await?;
            if cli.json {
                let result =
                    serde_json::json!({ "provider": client.provider_name(), "ok": true });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}: OK", client.provider_name());
            }
        }
    }

    Ok(())
}

fn build_provider(
    args: &BackendArgs,
    http: reqwest::Client,
) -> anyhow::Result<Arc<dyn ImageProvider>> {
    #[cfg(feature = "gemini")]
    {
        let mut builder = sculptor::GeminiProvider::builder().client(http);
        if let Some(ref id) = args.model {
            let model = sculptor::GeminiModel::from_id(id)
                .ok_or_else(|| anyhow::anyhow!("unknown Gemini model: {id}"))?;
            builder = builder.model(model);
        }
        if let Some(ref url) = args.endpoint {
            builder = builder.base_url(url);
        }
        Ok(Arc::new(builder.build()?))
    }
    #[cfg(not(feature = "gemini"))]
    {
        let _ = (args, http);
        anyhow::bail!("Gemini provider not enabled");
    }
}

fn random_config(args: &RandomArgs) -> StudioConfig {
    let config = StudioConfig::default();
    match &args.seed_url {
        Some(url) => config.with_seed_source(SeedSource::Remote { url: url.clone() }),
        None => config,
    }
}

/// Turns a stored session failure into a process error.
fn report(outcome: &OperationOutcome, studio: &Studio) -> anyhow::Result<()> {
    let state = studio.snapshot();
    match outcome {
        OperationOutcome::Completed(Phase::Failed) => {
            let message = state
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "operation failed".into());
            anyhow::bail!(message)
        }
        OperationOutcome::Completed(_) => Ok(()),
        OperationOutcome::Discarded => anyhow::bail!("operation was cancelled"),
    }
}

fn save_current(state: &SessionState, output: &Path, json_output: bool) -> anyhow::Result<()> {
    let image = state
        .current
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no sculpture to save"))?;
    // A bare name gets the extension of the returned format
    let output = match (output.extension(), image.format()) {
        (None, Some(format)) => output.with_extension(format.extension()),
        _ => output.to_path_buf(),
    };
    image.save(&output)?;
    print_saved(image, &output, json_output)
}

fn print_saved(image: &ImageRecord, output: &Path, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "output": output.display().to_string(),
            "size_bytes": image.size(),
            "mime_type": image.mime_type(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Saved sculpture: {} ({} bytes, {})",
            output.display(),
            image.size(),
            image.mime_type()
        );
    }
    Ok(())
}

const SESSION_HELP: &str = "\
commands:
  upload <path>    convert an image
  random           convert a random seed
  refine <text>    refine the current sculpture
  quick <n>        apply a quick edit (1-4)
  clear            reset the session
  save <path>      write the current sculpture
  status           show the session state
  quit             exit";

async fn run_session(studio: Studio) -> anyhow::Result<()> {
    // Stdin is blocking; read it on its own thread
    let (tx, mut lines) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    tokio::spawn(watch_session(studio.subscribe()));

    println!("{SESSION_HELP}");
    println!("quick edits:");
    for (i, edit) in QUICK_EDITS.iter().enumerate() {
        println!("  {}. {edit}", i + 1);
    }

    while let Some(line) = lines.recv().await {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim().to_string();

        match command {
            "" => {}
            "upload" => {
                let studio = studio.clone();
                tokio::spawn(async move { print_outcome(studio.upload_path(arg).await) });
            }
            "random" => {
                let studio = studio.clone();
                tokio::spawn(async move { print_outcome(studio.request_random().await) });
            }
            "refine" => {
                let studio = studio.clone();
                tokio::spawn(async move { print_outcome(studio.refine(&arg).await) });
            }
            "quick" => match arg.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) {
                Some(i) if i < QUICK_EDITS.len() => {
                    let studio = studio.clone();
                    tokio::spawn(
                        async move { print_outcome(studio.refine(QUICK_EDITS[i]).await) },
                    );
                }
                _ => println!("quick expects a number from 1 to {}", QUICK_EDITS.len()),
            },
            "clear" => studio.clear(),
            "save" => {
                if let Err(e) = save_current(&studio.snapshot(), Path::new(&arg), false) {
                    println!("error: {e}");
                }
            }
            "status" => print_status(&studio.snapshot()),
            "quit" | "exit" => break,
            _ => println!("{SESSION_HELP}"),
        }
    }

    Ok(())
}

fn print_outcome(result: sculptor::Result<OperationOutcome>) {
    match result {
        Ok(OperationOutcome::Completed(phase)) => println!("done: {phase}"),
        Ok(OperationOutcome::Discarded) => println!("discarded (session was cleared)"),
        Err(e) => println!("error: {e}"),
    }
}

fn print_status(state: &SessionState) {
    println!("phase:    {}", state.phase);
    let describe = |image: &Option<ImageRecord>| match image {
        Some(image) => format!("{} bytes ({})", image.size(), image.mime_type()),
        None => "none".to_string(),
    };
    println!("original: {}", describe(&state.original));
    println!("current:  {}", describe(&state.current));
    if let Some(ref err) = state.error {
        println!("error:    [{}] {}", err.kind, err.message);
    }
}

/// Prints phase changes, captions and errors as they happen.
async fn watch_session(mut rx: tokio::sync::watch::Receiver<SessionState>) {
    let mut last = rx.borrow().clone();
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        if state.phase != last.phase {
            eprintln!("[{}]", state.phase);
        }
        if state.caption != last.caption {
            if let Some(ref caption) = state.caption {
                eprintln!("  {caption}");
            }
        }
        if state.error != last.error {
            if let Some(ref err) = state.error {
                eprintln!("  error: {}", err.message);
            }
        }
        last = state;
    }
}
