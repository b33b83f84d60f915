//! Asset Filter CLI - runs the RequireJS optimizer as a single pipeline filter step

mod logging;
mod settings;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::info;

use assetfilter_core::application::tool::REQUIREJS_OPTION_KEYS;
use assetfilter_core::application::{ExternalProcessFilter, ExternalTool, FilterReport, RequireJs};
use assetfilter_core::domain::FilterOptions;
use assetfilter_core::port::id_provider::UuidProvider;
use assetfilter_core::port::time_provider::SystemTimeProvider;
use assetfilter_infra_system::{ScratchDirArtifactFactory, TokioProcessRunner};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "assetfilter")]
#[command(about = "Run an external build tool as an asset pipeline filter", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON settings file (REQUIREJS_* keys); environment variables override it
    #[arg(long, global = true, env = "ASSETFILTER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Log format: pretty or json
    #[arg(long, global = true, env = "ASSETFILTER_LOG_FORMAT", default_value = "pretty")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a single-file bundle and write it to stdout or --output
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Write the bundle here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// File whose content is fed to the tool's stdin
        #[arg(long)]
        input: Option<PathBuf>,

        /// Directory for per-invocation scratch output (default: system temp dir)
        #[arg(long)]
        scratch_dir: Option<PathBuf>,

        /// Print an invocation report to stderr
        #[arg(long)]
        report: bool,
    },

    /// Print the command line that would run, without running it
    Command {
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Build configuration plus option overrides (flags beat settings)
#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Build configuration file passed to `r.js -o`
    build_config: PathBuf,

    /// r.js executable
    #[arg(long)]
    binary: Option<PathBuf>,

    /// Extra r.js argument (repeatable); `out=` arguments are ignored
    #[arg(long = "extra-arg", allow_hyphen_values = true)]
    extra_args: Vec<String>,

    /// Main entry point of a whole-project build (declined)
    #[arg(long)]
    built_main: Option<PathBuf>,

    /// Kill the tool after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl TargetArgs {
    /// Overlay flags on options resolved from settings
    fn apply_to(&self, options: &mut FilterOptions) {
        if let Some(binary) = &self.binary {
            options.binary = Some(binary.clone());
        }
        if !self.extra_args.is_empty() {
            options.extra_args = self.extra_args.clone();
        }
        if let Some(built_main) = &self.built_main {
            options.built_main = Some(built_main.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            options.timeout_ms = Some(timeout_ms);
        }
    }
}

#[derive(Tabled)]
struct ReportRow {
    field: &'static str,
    value: String,
}

fn report_rows(report: &FilterReport) -> Vec<ReportRow> {
    let phases = report
        .phases
        .phases()
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" -> ");

    vec![
        ReportRow {
            field: "phases",
            value: phases,
        },
        ReportRow {
            field: "command",
            value: report
                .command
                .as_ref()
                .map(|c| c.join(" "))
                .unwrap_or_else(|| "(not launched)".to_string()),
        },
        ReportRow {
            field: "artifact",
            value: report
                .artifact_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
        },
        ReportRow {
            field: "cleaned_up",
            value: report.cleaned_up.to_string(),
        },
        ReportRow {
            field: "duration_ms",
            value: report.duration_ms.to_string(),
        },
    ]
}

fn resolve_options(settings_path: Option<&Path>, target: &TargetArgs) -> Result<FilterOptions> {
    let settings = settings::load(settings_path, &REQUIREJS_OPTION_KEYS)
        .context("Failed to load settings")?;
    let mut options = RequireJs
        .resolve_options(&settings)
        .context("Invalid requirejs settings")?;
    target.apply_to(&mut options);
    Ok(options)
}

fn build_filter(options: FilterOptions, scratch_dir: Option<PathBuf>) -> ExternalProcessFilter {
    // DI wiring
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let artifacts = match scratch_dir {
        Some(dir) => ScratchDirArtifactFactory::with_root(dir, id_provider),
        None => ScratchDirArtifactFactory::new(id_provider),
    };

    ExternalProcessFilter::new(
        Arc::new(RequireJs),
        options,
        Arc::new(TokioProcessRunner::new(time_provider.clone())),
        Arc::new(artifacts),
        time_provider,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_format)?;

    info!("assetfilter v{}", VERSION);

    match cli.command {
        Commands::Run {
            target,
            output,
            input,
            scratch_dir,
            report,
        } => {
            let options = resolve_options(cli.settings.as_deref(), &target)?;
            let input_bytes = match &input {
                Some(path) => std::fs::read(path)
                    .with_context(|| format!("Failed to read input {}", path.display()))?,
                None => Vec::new(),
            };

            let filter = build_filter(options, scratch_dir);
            let filter_report = filter
                .apply_with_report(&input_bytes, &target.build_config)
                .await;

            if report {
                eprintln!("{}", Table::new(report_rows(&filter_report)));
            }

            let bytes = filter_report
                .outcome
                .into_result()
                .context("requirejs filter failed")?;

            match &output {
                Some(path) => {
                    std::fs::write(path, &bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!(
                        "{}",
                        format!("✓ Wrote {} bytes to {}", bytes.len(), path.display())
                            .green()
                            .bold()
                    );
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&bytes).context("Failed to write to stdout")?;
                    stdout.flush()?;
                }
            }
        }

        Commands::Command { target } => {
            let options = resolve_options(cli.settings.as_deref(), &target)?;
            let filter = build_filter(options, None);

            if let Some(built_main) = &filter.options().built_main {
                println!(
                    "{}",
                    format!(
                        "whole-project build (built_main={}) is not supported",
                        built_main.display()
                    )
                    .yellow()
                );
            } else {
                println!("{}", filter.preview_command(&target.build_config).join(" "));
            }
        }
    }

    Ok(())
}
