//! Callprobe - VoIP call-flow and traffic analysis
//!
//! Reads a JSON array of classified packets and prints the capture analysis.

use anyhow::{Context, Result};
use callprobe::{AnalysisConfig, AnalysisEngine, CaptureAnalysis};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Analysis output with generation metadata
#[derive(Serialize)]
struct Output<'a> {
    generated_at: String,
    version: &'static str,
    #[serde(flatten)]
    analysis: &'a CaptureAnalysis,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("callprobe=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut input_path: Option<PathBuf> = None;
    let mut print_config = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--version" | "-v" => {
                println!("callprobe {} (built {})", callprobe::VERSION, callprobe::BUILD_DATE);
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--print-config" => {
                print_config = true;
            }
            "--config" | "-c" => {
                if i + 1 >= args.len() {
                    anyhow::bail!("--config requires a file path");
                }
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
                continue;
            }
            "--output" | "-o" => {
                if i + 1 >= args.len() {
                    anyhow::bail!("--output requires a file path");
                }
                output_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
                continue;
            }
            arg if arg.starts_with('-') => {
                print_help();
                anyhow::bail!("Unknown argument: {}", arg);
            }
            _ => {
                if input_path.is_none() {
                    input_path = Some(PathBuf::from(&args[i]));
                } else {
                    eprintln!("Ignoring extra argument: {}", args[i]);
                }
            }
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("Invalid config file {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    if print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let Some(input_path) = input_path else {
        print_help();
        anyhow::bail!("missing <packets.json>");
    };

    run(&input_path, output_path.as_deref(), config)
}

fn run(input: &Path, output: Option<&Path>, config: AnalysisConfig) -> Result<()> {
    let packets = callprobe::load_packets(input)
        .with_context(|| format!("Failed to load packets from {}", input.display()))?;

    let engine = AnalysisEngine::new(config);
    let analysis = engine.analyze(&packets);

    let document = Output {
        generated_at: chrono::Utc::now().to_rfc3339(),
        version: callprobe::VERSION,
        analysis: &analysis,
    };
    let json = serde_json::to_string_pretty(&document)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!(path = %path.display(), calls = analysis.calls.len(), "Report written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn print_help() {
    println!("Usage: callprobe [OPTIONS] <packets.json>");
    println!();
    println!("Analyze classified SIP/RTP packets: call reconstruction, jitter,");
    println!("packet loss, MOS, traffic behavior and statistical outliers.");
    println!();
    println!("Options:");
    println!("  -c, --config FILE   Load analysis settings from a JSON file");
    println!("  -o, --output FILE   Write the report to FILE instead of stdout");
    println!("      --print-config  Print the effective settings and exit");
    println!("  -v, --version       Show version");
    println!("  -h, --help          Show this help");
    println!();
    println!("Examples:");
    println!("  callprobe capture.json");
    println!("  callprobe -c strict.json -o report.json capture.json");
    println!();
    println!("Set RUST_LOG=callprobe_core=debug for per-call details.");
}
