//! flowmap CLI
//!
//! Entry point for the `flowmap` command-line tool.

use clap::{Parser, Subcommand};
use flowmap::config::{user_config_path, EffectiveSettings, PROJECT_FILE};
use flowmap::explain::explain_stanza;
use flowmap::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use flowmap::pipeline::{InputMode, Pipeline, PipelineError, RUN_SUMMARY_FILE};
use flowmap::summary::{new_run_id, ExitCode, RunSummary};
use flowmap::{Finding, ValidationReport};
use flowmap_conf::{ConfKind, ConfigLoader, PrecedenceMerger};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "flowmap")]
#[command(about = "Resolve layered Splunk configuration into a data-flow graph", version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a batch of host snapshots (or one snapshot) into a graph
    Resolve {
        /// Batch directory, or a single host snapshot
        path: PathBuf,

        /// Directory to write graph.json, findings.json, run_summary.json and job.log
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Settings file (default: ./flowmap.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Treat PATH as one host snapshot
        #[arg(long, conflicts_with = "batch")]
        single_host: bool,

        /// Treat PATH as a batch even if it looks like a snapshot
        #[arg(long)]
        batch: bool,

        /// Print the graph as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Run the validator over an existing graph.json
    Validate {
        graph: PathBuf,

        /// Settings file (default: ./flowmap.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Print findings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which layer, app and line won for each attribute of a stanza
    Explain {
        /// Host snapshot directory
        host_dir: PathBuf,

        /// Conf kind (inputs, outputs, props, transforms, indexes, server)
        kind: ConfKind,

        /// Stanza name without brackets
        stanza: String,

        /// Settings file (default: ./flowmap.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Tool settings
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective settings with per-key origins
    Show {
        /// Settings file (default: ./flowmap.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Resolve {
            path,
            out,
            config,
            single_host,
            batch,
            json,
        } => {
            let mode = if single_host {
                InputMode::SingleHost
            } else if batch {
                InputMode::Batch
            } else {
                InputMode::Auto
            };
            let settings = setup(config.as_deref(), cli.log_level, cli.log_format);
            run_resolve(&settings, &path, mode, out.as_deref(), json)
        }
        Commands::Validate { graph, config, json } => {
            let settings = setup(config.as_deref(), cli.log_level, cli.log_format);
            run_validate(&settings, &graph, json)
        }
        Commands::Explain {
            host_dir,
            kind,
            stanza,
            config,
            json,
        } => {
            let settings = setup(config.as_deref(), cli.log_level, cli.log_format);
            run_explain(&settings, &host_dir, kind, &stanza, json)
        }
        Commands::Config { action } => match action {
            ConfigCommands::Show { config } => {
                let settings = setup(config.as_deref(), cli.log_level, cli.log_format);
                print_json(settings.to_json())
            }
        },
    };
    process::exit(code);
}

/// Merge settings and install logging. Exits on invalid settings.
fn setup(config: Option<&Path>, log_level: Option<LogLevel>, log_format: Option<LogFormat>) -> EffectiveSettings {
    let project = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(PROJECT_FILE));
    if let Some(path) = config.filter(|p| !p.exists()) {
        eprintln!("Settings file not found: {}", path.display());
        process::exit(ExitCode::Config.as_i32());
    }

    let mut log = serde_json::Map::new();
    if let Some(level) = log_level {
        log.insert("level".to_string(), serde_json::Value::String(level.to_string()));
    }
    if let Some(format) = log_format {
        log.insert("format".to_string(), serde_json::Value::String(format.to_string()));
    }
    let cli_overrides = (!log.is_empty()).then(|| serde_json::json!({ "log": log }));

    let user = user_config_path();
    let effective = match EffectiveSettings::build(user.as_deref(), Some(&project), cli_overrides) {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("Settings error: {}", e);
            process::exit(ExitCode::Config.as_i32());
        }
    };

    let log_config = LogConfig::from_env(
        effective.settings.log.level,
        effective.settings.log.format,
        log_level,
        log_format,
    );
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Logging setup failed: {}", e);
    }
    effective
}

fn run_resolve(
    effective: &EffectiveSettings,
    path: &Path,
    mode: InputMode,
    out: Option<&Path>,
    json: bool,
) -> i32 {
    let start = Instant::now();
    let result = Pipeline::new(&effective.settings).and_then(|p| p.run(path, mode));
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(out_dir) = out {
                write_failed_summary(out_dir, &e, start.elapsed().as_millis() as u64);
            }
            return fail(&e);
        }
    };

    if let Some(out_dir) = out {
        if let Err(e) = report.write_artifacts(out_dir) {
            return fail(&e);
        }
    }

    if json {
        if print_json(report.graph.to_json()) != 0 {
            return ExitCode::Graph.as_i32();
        }
    } else {
        println!("run {}: {}", report.run_id, report.summary.human_summary);
        print_findings(&report.report);
        if let Some(out_dir) = out {
            println!("artifacts: {}", out_dir.display());
        }
    }
    report.summary.exit_code
}

fn run_validate(effective: &EffectiveSettings, graph_path: &Path, json: bool) -> i32 {
    let result = Pipeline::new(&effective.settings).and_then(|p| p.validate_file(graph_path));
    let (_, report) = match result {
        Ok(validated) => validated,
        Err(e) => return fail(&e),
    };

    if json {
        if print_json(serde_json::to_string_pretty(&report)) != 0 {
            return ExitCode::Graph.as_i32();
        }
    } else {
        print_findings(&report);
    }

    if !report.rule_errors.is_empty() {
        ExitCode::RuleFailed.as_i32()
    } else if report.has_errors() {
        ExitCode::ErrorFindings.as_i32()
    } else {
        ExitCode::Success.as_i32()
    }
}

fn run_explain(effective: &EffectiveSettings, host_dir: &Path, kind: ConfKind, stanza: &str, json: bool) -> i32 {
    let settings = &effective.settings;
    let loader = ConfigLoader::new(settings.redaction_policy());
    let merger = PrecedenceMerger::new(settings.app_order);

    match explain_stanza(&loader, &merger, host_dir, kind, stanza) {
        Ok(Some(explained)) => {
            if json {
                print_json(serde_json::to_string_pretty(&explained))
            } else {
                print!("{}", explained.render());
                0
            }
        }
        Ok(None) => {
            eprintln!("No layer on {} defines {}:[{}]", host_dir.display(), kind, stanza);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::BatchUnreadable.as_i32()
        }
    }
}

fn print_findings(report: &ValidationReport) {
    if report.findings.is_empty() {
        println!("no findings");
    }
    for finding in &report.findings {
        println!("{}", format_finding(finding));
    }
    for (rule, error) in &report.rule_errors {
        println!("rule {} failed: {}", rule, error);
    }
}

fn format_finding(finding: &Finding) -> String {
    let context: Vec<String> = finding
        .context
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!(
        "{:<7} {:<16} {} [{}]",
        finding.severity.to_string(),
        finding.code.to_string(),
        finding.message,
        context.join(" ")
    )
}

fn print_json(result: Result<String, serde_json::Error>) -> i32 {
    match result {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            1
        }
    }
}

/// Leave a `run_summary.json` behind even when no graph was produced.
fn write_failed_summary(out_dir: &Path, err: &PipelineError, duration_ms: u64) {
    let summary = RunSummary::failed(new_run_id(), err.exit_code(), &err.to_string(), duration_ms);
    let written = std::fs::create_dir_all(out_dir)
        .and_then(|_| summary.write_to_file(&out_dir.join(RUN_SUMMARY_FILE)));
    if let Err(e) = written {
        eprintln!("Failed to write run summary: {}", e);
    }
}

fn fail(err: &PipelineError) -> i32 {
    eprintln!("Error: {}", err);
    err.exit_code().as_i32()
}
