// SPDX-License-Identifier: MIT
//! fxp-tool - inspect, verify and convert FXP presets

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fxp_preset::batch;
use fxp_preset::writer::write_file;
use fxp_preset::{
    HumanReadableView, PatchDocument, PatchReader, PresetStats, RoundTripVerifier, ToolConfig,
    WriteStrategy,
};

#[derive(Parser)]
#[command(name = "fxp-tool")]
#[command(about = "Byte-exact FXP preset inspection and conversion")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print header fields and region sizes
    Info {
        input: PathBuf,
    },

    /// Check that load + save reproduces a file, or every preset in a directory
    Verify {
        path: PathBuf,
    },

    /// Write the interchange form (JSON) of a preset
    Extract {
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Swap in the wavetables of an interchange file, keeping the XML bytes
    Apply {
        input: PathBuf,

        interchange: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Re-render edited meta and parameters into the XML as well
        #[arg(long)]
        render_xml: bool,
    },

    /// Re-print the XML payload and recompute declared sizes
    Reinterpret {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(true)
        .init();

    let config = match &cli.config {
        Some(path) => ToolConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ToolConfig::default(),
    };

    match cli.command {
        Commands::Info { input } => info_command(&input, &config),
        Commands::Verify { path } => verify_command(&path, &config),
        Commands::Extract { input, output } => extract_command(&input, output.as_deref(), &config),
        Commands::Apply {
            input,
            interchange,
            output,
            render_xml,
        } => apply_command(&input, &interchange, &output, render_xml, &config),
        Commands::Reinterpret { input, output } => reinterpret_command(&input, &output, &config),
    }
}

fn load(path: &Path, config: &ToolConfig) -> Result<PatchDocument> {
    PatchReader::new(config.split_mode)
        .read_file(path)
        .with_context(|| format!("loading {}", path.display()))
}

fn info_command(input: &Path, config: &ToolConfig) -> Result<()> {
    let document = load(input, config)?;
    let header = document.header();
    let stats = PresetStats::of(&document);

    println!("file:         {}", input.display());
    println!("chunk magic:  {}", header.chunk_magic);
    println!("fx magic:     {}", header.fx_magic);
    println!("program:      {}", header.prg_name);
    println!("version:      {}", header.version);
    println!("fx id:        {:#010x}", header.fx_id);
    println!("fx version:   {}", header.fx_version);
    println!("programs:     {}", header.num_programs);
    println!("byteSize:     {}", header.byte_size);
    println!("chunkSize:    {}", header.chunk_size);
    println!("total:        {} bytes", stats.total_size);
    println!("pre-xml:      {} bytes", stats.pre_xml_size);
    println!("xml payload:  {} bytes", stats.xml_size);
    println!("post-xml:     {} bytes", stats.post_xml_size);
    for (size, digest) in stats.wavetable_sizes.iter().zip(document.wavetable_digests()) {
        println!("wavetable:    {} bytes sha256={}", size, digest);
    }
    for warning in document.warnings() {
        println!("warning:      {}", warning);
    }
    Ok(())
}

fn verify_command(path: &Path, config: &ToolConfig) -> Result<()> {
    if path.is_dir() {
        let report = batch::scan(path, config);
        for failure in &report.failures {
            println!("FAIL {}: {}", failure.path.display(), failure.error);
        }
        println!(
            "{} verified, {} failed",
            report.verified.len(),
            report.failures.len()
        );
        if !report.is_clean() {
            bail!("{} file(s) failed", report.failures.len());
        }
        return Ok(());
    }

    let result = RoundTripVerifier::new(config.split_mode).verify(path)?;
    for warning in &result.warnings {
        println!("warning: {}", warning);
    }
    result.into_result()?;
    println!("OK {}", path.display());
    Ok(())
}

fn extract_command(input: &Path, output: Option<&Path>, config: &ToolConfig) -> Result<()> {
    let document = load(input, config)?;
    let view = HumanReadableView::from_document(&document)?;
    let json = view.to_interchange_form()?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)?;
            info!(path = %path.display(), parameters = view.parameters.len(), "wrote interchange form");
        }
        None => println!("{}", String::from_utf8_lossy(&json)),
    }
    Ok(())
}

fn apply_command(
    input: &Path,
    interchange: &Path,
    output: &Path,
    render_xml: bool,
    config: &ToolConfig,
) -> Result<()> {
    let mut document = load(input, config)?;
    let text = std::fs::read(interchange)
        .with_context(|| format!("reading {}", interchange.display()))?;
    let view = HumanReadableView::from_interchange_form(&text)?;

    if render_xml {
        view.apply_to(&mut document, WriteStrategy::RenderXml, config.size_policy)?;
    } else {
        view.apply_wavetables(&mut document)?;
    }
    write_file(&document, output)?;

    info!(path = %output.display(), fidelity = ?document.fidelity(), "wrote preset");
    Ok(())
}

fn reinterpret_command(input: &Path, output: &Path, config: &ToolConfig) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let document = PatchDocument::load_and_reinterpret(&bytes, config.size_policy)?;
    write_file(&document, output)?;

    info!(
        path = %output.display(),
        xml = document.xml_payload().len(),
        "wrote reinterpreted preset"
    );
    Ok(())
}
