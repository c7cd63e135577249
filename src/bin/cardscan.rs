//! CLI binary for edgequake-cardscan.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScanConfig`, runs one scan or one history command, and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_cardscan::{
    BusinessCardRecord, CardField, FileStore, HistoryEntry, Orchestrator, ScanConfig,
    ScanConfigBuilder, ScanObserver, ScanObserverRef,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner while the VLM reads the card, one line per
/// failed attempt, and a final tick or cross.
struct CliScanObserver {
    bar: ProgressBar,
}

impl CliScanObserver {
    fn new() -> Arc<Self> {
        // Nothing is drawn until the scan actually starts, so a failed file
        // read leaves no stray spinner behind.
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        Arc::new(Self { bar })
    }
}

impl ScanObserver for CliScanObserver {
    fn on_scan_start(&self, image_bytes: usize) {
        self.bar.set_prefix("Scanning");
        self.bar
            .set_message(format!("reading card ({:.1} KB)…", image_bytes as f64 / 1024.0));
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_attempt_failed(&self, attempt: u32, max_retries: u32, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} attempt {}/{}  {}",
            red("✗"),
            attempt,
            max_retries + 1,
            red(&msg)
        ));
        self.bar.set_message("retrying…");
    }

    fn on_scan_complete(&self, record: &BusinessCardRecord) {
        self.bar.finish_and_clear();
        let who = if record.name.is_empty() {
            "card read".to_string()
        } else {
            record.name.clone()
        };
        eprintln!("{} {}", green("✔"), bold(&who));
    }

    fn on_scan_error(&self, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), red(message));
    }

    fn on_history_saved(&self, entry: &HistoryEntry, history_len: usize) {
        eprintln!(
            "{} saved as {}  {}",
            green("✔"),
            bold(&entry.id.to_string()),
            dim(&format!("({history_len} in history)"))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan a card and print the contact details
  cardscan scan card.jpg

  # Scan and keep the result in history
  cardscan scan --save card.png

  # Just the email address, ready to paste
  cardscan scan card.jpg --field email

  # Scan from a URL with a specific model, JSON output
  cardscan scan --model gpt-4.1-mini --json https://example.com/card.webp

  # Browse and manage history
  cardscan history list
  cardscan history show 1718000000000 --field phone
  cardscan history clear --yes

FIELDS (for --field):
  name, jobTitle, companyName, phone, email, address, website, description
  (snake_case and kebab-case spellings are accepted too)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  CARDSCAN_HISTORY_DIR    Where history is stored (default: <data dir>/cardscan)

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Scan:            cardscan scan card.jpg --save
"#;

/// Turn business card photos into structured contact records using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "cardscan",
    version,
    about = "Turn business card photos into structured contact records using Vision LLMs",
    long_about = "Read a business card photo (local file or URL) with a Vision Language Model \
and extract name, job title, company, phone, email, address, website and a short description. \
Results can be saved to a local history. Supports OpenAI, Anthropic, Google Gemini, Azure \
OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the scan history.
    #[arg(long, global = true, env = "CARDSCAN_HISTORY_DIR")]
    history_dir: Option<PathBuf>,

    /// Maximum saved scans to keep (0 = unlimited).
    #[arg(long, global = true, env = "CARDSCAN_HISTORY_LIMIT")]
    history_limit: Option<usize>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CARDSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "CARDSCAN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan one business card image.
    Scan(ScanArgs),

    /// Browse or clear saved scans.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Local image path (PNG, JPEG, WebP) or HTTP/HTTPS URL.
    input: String,

    /// Save the result to history.
    #[arg(long, env = "CARDSCAN_SAVE")]
    save: bool,

    /// Output the record as JSON.
    #[arg(long, env = "CARDSCAN_JSON")]
    json: bool,

    /// Print only this field's value.
    #[arg(long, conflicts_with = "json")]
    field: Option<CardField>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "CARDSCAN_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "CARDSCAN_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Retries when the LLM call fails.
    #[arg(long, env = "CARDSCAN_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// LLM call timeout in seconds.
    #[arg(long, env = "CARDSCAN_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "CARDSCAN_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// Path to a text file containing a custom extraction instruction.
    #[arg(long, env = "CARDSCAN_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Disable the spinner.
    #[arg(long, env = "CARDSCAN_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List saved scans, newest first.
    List {
        /// Output entries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one saved scan.
    Show {
        /// Entry id as printed by `history list`.
        id: String,

        /// Output the entry as JSON.
        #[arg(long)]
        json: bool,

        /// Print only this field's value.
        #[arg(long, conflicts_with = "json")]
        field: Option<CardField>,
    },

    /// Delete every saved scan.
    Clear {
        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // spinner provides all the feedback that matters to the user.
    let show_progress = match &cli.command {
        Command::Scan(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::History { .. } => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let storage = open_storage(&cli)?;

    match &cli.command {
        Command::Scan(args) => {
            let observer: Option<ScanObserverRef> = if show_progress {
                Some(CliScanObserver::new() as Arc<dyn ScanObserver>)
            } else {
                None
            };
            run_scan(&cli, args, storage, observer).await
        }
        Command::History { action } => run_history(&cli, action, storage),
    }
}

async fn run_scan(
    cli: &Cli,
    args: &ScanArgs,
    storage: FileStore,
    observer: Option<ScanObserverRef>,
) -> Result<()> {
    let quiet_summary = observer.is_some() || cli.quiet;
    let config = build_config(cli, args, observer).await?;
    let mut scanner = Orchestrator::from_config(config, storage);

    let record = scanner
        .handle_capture_input(&args.input)
        .await
        .context("Scan failed")?;

    print_record(&record, args.json, args.field)?;

    if args.save {
        let entry = scanner.handle_save().context("Failed to save to history")?;
        if !quiet_summary {
            eprintln!("Saved as {} ({} in history)", entry.id, scanner.history().len());
        }
    }
    Ok(())
}

fn run_history(cli: &Cli, action: &HistoryAction, storage: FileStore) -> Result<()> {
    let config = apply_history_limit(ScanConfig::builder(), cli.history_limit)
        .build()
        .context("Invalid configuration")?;
    let mut scanner = Orchestrator::from_config(config, storage);

    match action {
        HistoryAction::List { json } => {
            let history = scanner.history();
            if *json {
                let out = serde_json::to_string_pretty(history.list())
                    .context("Failed to serialise history")?;
                println!("{out}");
            } else if history.is_empty() {
                if !cli.quiet {
                    eprintln!("{}", dim("No saved scans."));
                }
            } else {
                for entry in history.list() {
                    println!(
                        "{}  {}  {}  {}",
                        cyan(&entry.id.to_string()),
                        dim(&entry
                            .captured_at
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M")
                            .to_string()),
                        bold(or_dash(&entry.record.name)),
                        or_dash(&entry.record.company_name),
                    );
                }
            }
        }

        HistoryAction::Show { id, json, field } => {
            let record = scanner.handle_select_history(id)?.clone();
            if *json {
                let entry = scanner.history().select(id)?;
                let out =
                    serde_json::to_string_pretty(entry).context("Failed to serialise entry")?;
                println!("{out}");
                return Ok(());
            }
            print_record(&record, false, *field)?;
        }

        HistoryAction::Clear { yes } => {
            let count = scanner.history().len();
            let mut prompt_error = None;
            let cleared = scanner
                .handle_clear_history(|n| {
                    if *yes || n == 0 {
                        return true;
                    }
                    confirm(n).unwrap_or_else(|e| {
                        prompt_error = Some(e);
                        false
                    })
                })
                .context("Failed to clear history")?;
            if let Some(e) = prompt_error {
                return Err(e);
            }
            if !cleared {
                eprintln!("Cancelled.");
                return Ok(());
            }
            if !cli.quiet {
                eprintln!("{} cleared {} saved scan(s)", green("✔"), count);
            }
        }
    }
    Ok(())
}

/// Map CLI args to `ScanConfig`.
async fn build_config(
    cli: &Cli,
    args: &ScanArgs,
    observer: Option<ScanObserverRef>,
) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout);
    builder = apply_history_limit(builder, cli.history_limit);

    if let Some(ref path) = args.instruction {
        let instruction = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction(instruction);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }

    builder.build().context("Invalid configuration")
}

fn apply_history_limit(builder: ScanConfigBuilder, limit: Option<usize>) -> ScanConfigBuilder {
    match limit {
        Some(0) => builder.unbounded_history(),
        Some(n) => builder.history_limit(n),
        None => builder,
    }
}

fn open_storage(cli: &Cli) -> Result<FileStore> {
    let dir = match cli.history_dir {
        Some(ref dir) => dir.clone(),
        None => dirs::data_dir()
            .map(|d| d.join("cardscan"))
            .context("Could not determine a data directory; pass --history-dir")?,
    };
    FileStore::open(&dir).with_context(|| format!("Failed to open history in {:?}", dir))
}

fn print_record(record: &BusinessCardRecord, json: bool, field: Option<CardField>) -> Result<()> {
    if let Some(field) = field {
        println!("{}", record.get(field));
        return Ok(());
    }
    if json {
        let out = serde_json::to_string_pretty(record).context("Failed to serialise record")?;
        println!("{out}");
        return Ok(());
    }
    if record.is_blank() {
        println!("{}", dim("(no details found on this card)"));
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for (field, value) in record.fields().filter(|(_, v)| !v.is_empty()) {
        writeln!(handle, "{:<18}{}", format!("{}:", field.label()), value)
            .context("Failed to write to stdout")?;
    }
    Ok(())
}

fn confirm(count: usize) -> Result<bool> {
    eprint!("Delete {count} saved scan(s)? This cannot be undone. [y/N] ");
    io::stderr().flush().ok();
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "—"
    } else {
        s
    }
}
