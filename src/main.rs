use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bpmn_lens::cli::commands::analyze::{AnalyzeOptions, OutputFormat};
use bpmn_lens::config::ConfigFormat;

/// Parse report output format from string
fn parse_output_format(s: &str) -> Result<OutputFormat, String> {
    s.parse()
}

/// Parse config output format from string
fn parse_config_format(s: &str) -> Result<ConfigFormat, String> {
    match s.to_lowercase().as_str() {
        "toml" => Ok(ConfigFormat::Toml),
        "json" => Ok(ConfigFormat::Json),
        _ => Err(format!("Invalid format '{}'. Valid values: toml, json", s)),
    }
}

#[derive(Parser)]
#[command(name = "bpmn-lens")]
#[command(
    version,
    about = "LLM-backed structure, security, and performance review of BPMN diagrams"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a parsed BPMN diagram (JSON)
    Analyze {
        #[arg(help = "Path to the parsed process model JSON")]
        model: PathBuf,
        #[arg(long, help = "Diagram id (defaults to the id in the file, then the file stem)")]
        diagram_id: Option<String>,
        #[arg(
            long,
            value_delimiter = ',',
            help = "Providers in fallback order, e.g. ollama,openrouter"
        )]
        provider_order: Option<Vec<String>>,
        #[arg(
            long,
            value_delimiter = ',',
            help = "Phases to run: structure, security, performance, comprehensive, logic, validation"
        )]
        phases: Option<Vec<String>>,
        #[arg(long, help = "Deadline for the whole run in seconds")]
        deadline_secs: Option<u64>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            value_parser = parse_output_format,
            help = "Output format: text, json"
        )]
        format: OutputFormat,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            value_parser = parse_config_format,
            help = "Output format: toml, json"
        )]
        format: ConfigFormat,
    },
    /// Show configuration file paths
    Path,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mbpmn-lens encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Default hook prints the backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Analyze {
            model,
            diagram_id,
            provider_order,
            phases,
            deadline_secs,
            format,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(bpmn_lens::cli::commands::analyze::run(AnalyzeOptions {
                model_path: model,
                diagram_id,
                provider_order,
                phases,
                deadline_secs,
                format,
            }))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                bpmn_lens::cli::commands::config::show(format)?;
            }
            ConfigAction::Path => {
                bpmn_lens::cli::commands::config::path()?;
            }
        },
    }

    Ok(())
}
