//! clientgen - generate a typed TypeScript client from an API description

use std::path::PathBuf;

use clap::Parser;
use clientgen::PipelineError;
use clientgen::adapters::{FallbackMode, command_registry};
use clientgen::config::PipelineConfig;
use clientgen::format::Formatter;
use clientgen::pipeline::{Pipeline, RunReport, RunRequest};
use colored::Colorize;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Generate a typed client from an OpenAPI or Swagger description
#[derive(Parser, Debug)]
#[command(name = "clientgen")]
#[command(version, about, long_about = None)]
struct Cli {
    /// API description document (JSON or YAML)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Directory the client is generated into
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Directory holding the generator templates
    #[arg(short, long, value_name = "DIR", default_value = "templates")]
    templates: PathBuf,

    /// Continue even when required templates are missing
    #[arg(long)]
    force: bool,

    /// What to do when no adapter supports the version: strict, warn or auto
    ///
    /// Defaults to CLIENTGEN_FALLBACK_MODE, then auto.
    #[arg(long, value_name = "MODE")]
    fallback: Option<FallbackMode>,

    /// Drive an external generator binary instead of the built-in templates
    #[arg(long, value_name = "PROGRAM")]
    generator: Option<String>,

    /// Formatter command run over the output directory (e.g. "prettier --write")
    #[arg(long, value_name = "COMMAND")]
    format_with: Option<String>,

    /// Do not generate options-object service methods
    #[arg(long)]
    no_options: bool,

    /// Do not generate literal union types
    #[arg(long)]
    no_union_types: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    json: bool,
}

/// Initialize tracing subscriber based on verbosity and output format
fn init_tracing(verbose: u8, json: bool) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,clientgen=info".to_string(),
            2 => "info,clientgen=debug".to_string(),
            _ => "debug,clientgen=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

fn report_error(err: &PipelineError) {
    eprintln!("{} {}", "error:".red().bold(), err);

    if let PipelineError::MissingTemplates { dir, missing } = err {
        eprintln!("Missing templates in {}:", dir.display());
        for name in missing {
            eprintln!("  {} {}", "-".yellow(), name);
        }
        eprintln!("Add the templates or rerun with --force to generate anyway.");
    }
}

fn print_report(report: &RunReport, output: &std::path::Path) {
    let detection = &report.detection;
    println!(
        "{} {} (version {}) with {}",
        "Generated".green().bold(),
        output.display(),
        detection.version,
        detection.adapter
    );

    if let Some(mode) = detection.applied_fallback {
        println!(
            "  {} no adapter supports {}, used the default (fallback: {})",
            "note:".yellow(),
            detection.version,
            mode
        );
    }

    if !report.missing_templates.is_empty() {
        println!(
            "  {} generated without {}",
            "note:".yellow(),
            report.missing_templates.join(", ")
        );
    }

    println!(
        "  post-processed {} of {} TypeScript files",
        report.transform.changed.len(),
        report.transform.scanned
    );

    match report.formatted {
        Some(true) => println!("  formatted output"),
        Some(false) => println!("  {} formatter failed, output left unformatted", "note:".yellow()),
        None => {}
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let config = PipelineConfig::from_env();
    tracing::debug!(?config, "Resolved configuration");

    let mut pipeline = Pipeline::new(config);
    if let Some(program) = &cli.generator {
        pipeline = pipeline.with_registry(command_registry(program));
    }

    let request = RunRequest {
        description: cli.input,
        output_dir: cli.output.clone(),
        template_dir: cli.templates,
        fallback: cli.fallback,
        force: cli.force,
        use_options: !cli.no_options,
        use_union_types: !cli.no_union_types,
        formatter: cli.format_with.as_deref().and_then(Formatter::parse),
    };

    let result = pipeline.run(&request);
    pipeline.flush_performance();

    match result {
        Ok(report) => print_report(&report, &cli.output),
        Err(err) => {
            report_error(&err);
            std::process::exit(1);
        }
    }
}
