use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use toolparse::{parse_with_config, ParserConfig, RawOutput};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "toolparse")]
#[command(about = "Normalize security tool output into JSON hosts and findings")]
#[command(version)]
struct Cli {
    /// Tool or format of every input (e.g. nmap_xml, nuclei, fuzz_result_json)
    #[arg(short, long)]
    tool: Option<String>,

    /// Report fuzz results outside 200-399 as findings too
    #[arg(long)]
    include_unsuccessful_fuzz: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Files to parse; `-` reads stdin
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "toolparse=info".into()))
        .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = ParserConfig::from_env();
    if cli.include_unsuccessful_fuzz {
        config.include_unsuccessful_fuzz = true;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for input in &cli.inputs {
        let (data, source) = read_input(input)?;
        let raw = RawOutput::new(&data).with_source(&source);
        let result = parse_with_config(&raw, cli.tool.as_deref(), &config)
            .with_context(|| format!("Failed to parse {source}"))?;

        tracing::info!(
            source = %source,
            tool = %result.tool,
            format = %result.format,
            hosts = result.hosts.len(),
            open_ports = result.open_port_count(),
            findings = result.findings.len(),
            warnings = result.warnings.len(),
            parse_errors = result.parse_errors.len(),
            "Parsed input"
        );

        if cli.pretty {
            serde_json::to_writer_pretty(&mut out, &result)?;
        } else {
            serde_json::to_writer(&mut out, &result)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<(Vec<u8>, String)> {
    if path.as_os_str() == "-" {
        let mut data = Vec::new();
        io::stdin()
            .read_to_end(&mut data)
            .context("Failed to read stdin")?;
        return Ok((data, "<stdin>".to_string()));
    }
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok((data, path.display().to_string()))
}
