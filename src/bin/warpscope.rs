use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Once;
use tokio_util::sync::CancellationToken;
use warpscope::config::Config;
use warpscope::report::split_sections;

fn init_parallelism() {
    static START: Once = Once::new();
    START.call_once(|| {
        let n = num_cpus::get();
        let _ = rayon::ThreadPoolBuilder::new().num_threads(n).build_global();
    });
}

#[derive(Parser, Debug)]
#[command(name = "warpscope", version, about = "Known-pattern and AI analysis of WARP client logs")]
struct Cli {
    /// Log file (`-` or omitted for stdin)
    input: Option<String>,

    /// Free-text description of the issue being investigated
    #[arg(long = "context", short = 'c')]
    context: Option<String>,

    /// TOML configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Pattern file (`[[pattern]]` tables); overrides the configured store
    #[arg(long = "patterns", short = 'p')]
    patterns: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print only one section (text format only)
    #[arg(long = "section", value_enum, default_value_t = Section::All)]
    section: Section,

    /// Print the inference payload as JSON instead of calling the model
    #[arg(long = "dry-run", default_value_t = false)]
    dry_run: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Section {
    All,
    Known,
    Ai,
}

fn read_input(input: Option<&str>) -> anyhow::Result<String> {
    let mut bytes = Vec::new();
    match input {
        Some(p) if p != "-" => {
            File::open(p)
                .and_then(|mut f| f.read_to_end(&mut bytes))
                .with_context(|| format!("reading {p}"))?;
        }
        _ => {
            if atty::is(atty::Stream::Stdin) {
                bail!("no log file given and stdin is a terminal");
            }
            io::stdin().lock().read_to_end(&mut bytes).context("reading stdin")?;
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
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

    init_parallelism();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let analyzer = config.build_analyzer(cli.patterns.as_deref(), |k| std::env::var(k).ok())?;
    let log = read_input(cli.input.as_deref())?;

    if cli.dry_run {
        let payload = analyzer.prepare_prompt(&log, cli.context.as_deref()).await?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let c = cancel.clone();
        let _ = ctrlc::set_handler(move || c.cancel());
    }

    let report = analyzer.analyze_with_cancel(&log, cli.context.as_deref(), &cancel).await?;

    if cli.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let rendered = report.render();
    match cli.section {
        Section::Known => println!("{}", split_sections(&rendered).known),
        Section::Ai => println!("{}", split_sections(&rendered).ai.unwrap_or_default()),
        Section::All => println!("{rendered}"),
    }
    Ok(())
}
