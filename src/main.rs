use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use element_locator::InteractionDescriptor;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use waypoint_cli::{
    commands,
    config::{default_config_path, load_config, WaypointConfig},
    output::{render, OutputFormat},
    CliError, Page,
};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("WAYPOINT_GIT_HASH"),
    ", built ",
    env!("WAYPOINT_BUILD_DATE"),
    ")"
);

/// Waypoint - resolve tour targets and pin overlays to settling page geometry
#[derive(Parser)]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a descriptor against a page fixture
    Resolve(TargetArgs),

    /// Resolve, then stabilize an overlay while the fixture timeline plays
    Track(TargetArgs),

    /// Resolve, then scroll the element into view
    Scroll(TargetArgs),

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct TargetArgs {
    /// Page fixture (JSON)
    #[arg(short, long, value_name = "FILE")]
    page: PathBuf,

    /// CSS selector of the target
    #[arg(short, long)]
    selector: Option<String>,

    /// Visible text or value of the target
    #[arg(short, long)]
    text: Option<String>,

    /// Allow substring text matches
    #[arg(long, conflicts_with = "exact")]
    loose: bool,

    /// Require exact text matches even if the configuration says otherwise
    #[arg(long)]
    exact: bool,
}

impl TargetArgs {
    fn descriptor(&self, config: &WaypointConfig) -> InteractionDescriptor {
        let exact = if self.loose {
            false
        } else {
            self.exact || config.locator.exact_match_by_default
        };
        InteractionDescriptor {
            selector: self.selector.clone(),
            text: self.text.clone(),
            require_exact_match: exact,
        }
    }

    fn load_page(&self) -> Result<Page> {
        Page::load(&self.page)
            .with_context(|| format!("Failed to load page fixture {}", self.page.display()))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli.log_level, cli.log_json) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }

    match run(cli).await {
        Ok(()) => info!("Command completed successfully"),
        Err(err) => {
            error!("Command failed: {:#}", err);
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<CliError>()
                .map(CliError::exit_code)
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref()).await?;

    let rendered = match &cli.command {
        Commands::Resolve(args) => {
            let page = args.load_page()?;
            let report = commands::resolve(&page, &config.locator, &args.descriptor(&config))?;
            render(&report, cli.output)?
        }
        Commands::Track(args) => {
            let page = args.load_page()?;
            let report = commands::track(&page, &config, &args.descriptor(&config)).await?;
            render(&report, cli.output)?
        }
        Commands::Scroll(args) => {
            let page = args.load_page()?;
            let report = commands::scroll(&page, &config, &args.descriptor(&config)).await?;
            render(&report, cli.output)?
        }
        Commands::Config => cmd_config(&config, cli.config.as_ref(), cli.output)?,
    };
    println!("{rendered}");
    Ok(())
}

fn cmd_config(
    config: &WaypointConfig,
    path: Option<&PathBuf>,
    format: OutputFormat,
) -> Result<String> {
    let source = path
        .cloned()
        .or_else(default_config_path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<defaults>".to_string());
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(config)?,
        OutputFormat::Yaml | OutputFormat::Human => {
            format!("# source: {source}\n{}", serde_yaml::to_string(config)?)
        }
    })
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let level: tracing::Level = level.parse().context("Invalid log level")?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}
