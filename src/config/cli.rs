//! CLI argument parsing and validation
//!
//! # Usage
//!
//! ```bash
//! afinar refine config.yaml
//! afinar refine config.yaml --concurrency 8 --output refined.json
//! afinar validate config.yaml --detailed
//! afinar info config.yaml --format yaml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Afinar: feedback propagation over value-flow graphs
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "afinar")]
#[command(version)]
#[command(about = "Refine values by propagating textual feedback through the graph that produced them")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run one refinement step from YAML configuration
    Refine(RefineArgs),

    /// Validate a configuration file without running it
    Validate(ValidateArgs),

    /// Display information about a configuration
    Info(InfoArgs),
}

/// Arguments for the refine command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct RefineArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override the number of parameters updated concurrently
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Write the refined values to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for info command
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown output format: {}. Valid formats: text, json, yaml",
                s
            )),
        }
    }
}

/// Parse arguments, returning clap's error instead of exiting
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a loaded spec
pub fn apply_overrides(spec: &mut super::RefineSpec, args: &RefineArgs) {
    if let Some(concurrency) = args.concurrency {
        spec.engine.max_concurrency = concurrency;
    }
    // output is CLI-only and not persisted in config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_refine_command() {
        let cli = parse_args(["afinar", "refine", "config.yaml"]).unwrap();
        match cli.command {
            Command::Refine(args) => {
                assert_eq!(args.config, PathBuf::from("config.yaml"));
                assert_eq!(args.concurrency, None);
                assert_eq!(args.output, None);
            }
            _ => panic!("Expected Refine command"),
        }
    }

    #[test]
    fn test_parse_refine_with_overrides() {
        let cli = parse_args([
            "afinar",
            "refine",
            "config.yaml",
            "--concurrency",
            "8",
            "--output",
            "refined.json",
        ])
        .unwrap();

        match cli.command {
            Command::Refine(args) => {
                assert_eq!(args.concurrency, Some(8));
                assert_eq!(args.output, Some(PathBuf::from("refined.json")));
            }
            _ => panic!("Expected Refine command"),
        }
    }

    #[test]
    fn test_parse_validate_detailed() {
        let cli = parse_args(["afinar", "validate", "config.yaml", "--detailed"]).unwrap();
        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.config, PathBuf::from("config.yaml"));
                assert!(args.detailed);
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_parse_info_formats() {
        let cli = parse_args(["afinar", "info", "config.yaml"]).unwrap();
        match cli.command {
            Command::Info(args) => assert_eq!(args.format, OutputFormat::Text),
            _ => panic!("Expected Info command"),
        }

        let cli = parse_args(["afinar", "info", "config.yaml", "--format", "yaml"]).unwrap();
        match cli.command {
            Command::Info(args) => assert_eq!(args.format, OutputFormat::Yaml),
            _ => panic!("Expected Info command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = parse_args(["afinar", "--verbose", "validate", "config.yaml"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.quiet);

        let cli = parse_args(["afinar", "info", "config.yaml", "-q"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_missing_config_is_an_error() {
        assert!(parse_args(["afinar", "refine"]).is_err());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut spec: crate::config::RefineSpec =
            serde_yaml::from_str("parameters: []").unwrap();
        let args = RefineArgs {
            config: PathBuf::from("config.yaml"),
            concurrency: Some(2),
            output: None,
        };
        apply_overrides(&mut spec, &args);
        assert_eq!(spec.engine.max_concurrency, 2);
    }
}
