//! Afinar CLI
//!
//! Single-command refinement entry point for the afinar library.
//!
//! # Usage
//!
//! ```bash
//! # Refine the values in a config
//! afinar refine config.yaml
//!
//! # Refine with overrides, writing the result to a file
//! afinar refine config.yaml --concurrency 8 --output refined.json
//!
//! # Validate config
//! afinar validate config.yaml
//!
//! # Show config info
//! afinar info config.yaml --format json
//! ```

use afinar::config::{
    apply_overrides, load_config, refine, Cli, Command, InfoArgs, OutputFormat, RefineArgs,
    RefineSpec, ValidateArgs,
};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.command {
        Command::Refine(args) => &args.config,
        Command::Validate(args) => &args.config,
        Command::Info(args) => &args.config,
    };
    let spec = match load_config(config) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&cli, &spec);

    let result = match cli.command {
        Command::Refine(args) => run_refine(args, spec, cli.quiet).await,
        Command::Validate(args) => run_validate(args, &spec, cli.quiet),
        Command::Info(args) => run_info(args, &spec),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise `--quiet`/`--verbose`, then the config's level
fn init_logging(cli: &Cli, spec: &RefineSpec) {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        spec.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_refine(args: RefineArgs, mut spec: RefineSpec, quiet: bool) -> Result<(), String> {
    apply_overrides(&mut spec, &args);

    let report = refine(&spec)
        .await
        .map_err(|e| format!("Refinement error: {e}"))?;
    let json = serde_json::to_string_pretty(&report.values)
        .map_err(|e| format!("JSON serialization error: {e}"))?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
            if !quiet {
                println!(
                    "Refined {} of {} parameters; wrote {}",
                    report.applied,
                    spec.parameters.len(),
                    path.display()
                );
            }
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_validate(args: ValidateArgs, spec: &RefineSpec, quiet: bool) -> Result<(), String> {
    if !quiet {
        println!("Configuration is valid: {}", args.config.display());
    }

    if args.detailed {
        println!();
        println!("Configuration Summary:");
        println!("  Max concurrency: {}", spec.engine.max_concurrency);
        println!("  Log level: {}", spec.logging.level);
        println!();
        println!("  Parameters:");
        for param in &spec.parameters {
            println!("    {} ({})", param.name, param.datatype);
        }
        if !spec.feedback.is_empty() {
            println!();
            println!("  Feedback:");
            for item in &spec.feedback {
                println!("    {} -> {}", item.text, item.targets.join(", "));
            }
        }
        println!();
        println!("  Replay responses: {}", spec.reasoner.replay.len());
    }

    Ok(())
}

fn run_info(args: InfoArgs, spec: &RefineSpec) -> Result<(), String> {
    match args.format {
        OutputFormat::Text => {
            println!("Configuration Info:");
            println!();
            println!("Parameters: {}", spec.parameters.len());
            println!("Feedback items: {}", spec.feedback.len());
            println!("Replay responses: {}", spec.reasoner.replay.len());
            println!("Max concurrency: {}", spec.engine.max_concurrency);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(spec)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(spec)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
