//! MER <-> LabPBR texture converter CLI

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use labpbr_core::{
    convert_auto, convert_directory, convert_to_bedrock, convert_to_labpbr, BatchReport,
    ConversionDirection, ConversionOptions, ConversionResult, ConverterConfig, FormatDetector,
    OutputFormat,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "labpbr")]
#[command(about = "Convert textures between packed MER and LabPBR.")]
#[command(version = concat!("v", env!("CARGO_PKG_VERSION")))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML). Defaults to $LABPBR_CONFIG when set.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Flags shared by every conversion command
#[derive(Args, Debug, Clone, Default)]
struct OutputArgs {
    /// Output folder (default: next to the source texture)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Output format: png, jpg, or tga
    #[arg(short, long)]
    format: Option<String>,
    /// Quality / compression level (1-10)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=10))]
    quality: Option<u8>,
    /// Bake ambient occlusion into the base color
    #[arg(short = 'b', long)]
    bake_ao: bool,
    /// Extract the heightmap from the normal texture
    #[arg(short = 'e', long)]
    extract_height: bool,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
    /// Only print failures and the summary
    #[arg(long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a packed MER texture to LabPBR
    Convert {
        /// Path to the MER texture
        mer: PathBuf,
        /// Base color texture (used to pick predefined metals)
        #[arg(long)]
        base: Option<PathBuf>,
        /// Normal map to carry over into the LabPBR normal texture
        #[arg(long)]
        normal: Option<PathBuf>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Convert a LabPBR specular + normal pair to packed MER
    ConvertToBedrock {
        /// Path to the LabPBR specular texture (_s)
        specular: PathBuf,
        /// Path to the LabPBR normal texture (_n)
        #[arg(short, long)]
        normal: PathBuf,
        /// Base color texture (needed for --bake-ao)
        #[arg(long)]
        base: Option<PathBuf>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Detect the texture convention and convert in the matching direction
    ConvertAuto {
        /// Path to any texture of the set
        path: PathBuf,
        /// Direction: auto, to-labpbr, or to-bedrock
        #[arg(short, long, default_value = "auto")]
        direction: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Convert every texture set in a folder
    ConvertDir {
        /// Folder to scan
        dir: PathBuf,
        /// Descend into subfolders
        #[arg(short, long)]
        recursive: bool,
        /// Direction: auto, to-labpbr, or to-bedrock
        #[arg(short, long, default_value = "auto")]
        direction: String,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Show which convention a texture uses
    Detect {
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when any conversion failed.
fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConverterConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert { mer, base, normal, out } => {
            let options = build_options(&config, &out)?;
            let result = convert_to_labpbr(&mer, base.as_deref(), normal.as_deref(), &options);
            print_single(&result, &out)
        }
        Commands::ConvertToBedrock { specular, normal, base, out } => {
            let options = build_options(&config, &out)?;
            let result = convert_to_bedrock(&specular, &normal, base.as_deref(), &options);
            print_single(&result, &out)
        }
        Commands::ConvertAuto {
            path,
            direction,
            out,
        } => cmd_convert_auto(&config, &path, &direction, &out),
        Commands::ConvertDir { dir, recursive, direction, out } => {
            cmd_convert_dir(&config, &dir, recursive, &direction, &out)
        }
        Commands::Detect { path, json } => cmd_detect(&path, json),
    }
}

/// Config values first, command-line flags on top.
fn build_options(
    config: &ConverterConfig,
    out: &OutputArgs,
) -> Result<ConversionOptions, Box<dyn std::error::Error>> {
    let mut options = config.to_options();
    if let Some(dir) = &out.output {
        options.output_dir = Some(dir.clone());
    }
    if let Some(format) = &out.format {
        options.format = format.parse::<OutputFormat>()?;
    }
    if let Some(quality) = out.quality {
        options.quality = quality;
    }
    options.bake_ao |= out.bake_ao;
    options.extract_height |= out.extract_height;
    Ok(options)
}

fn parse_direction(
    direction: &str,
) -> Result<Option<ConversionDirection>, Box<dyn std::error::Error>> {
    match direction.parse::<ConversionDirection>()? {
        ConversionDirection::Auto => Ok(None),
        forced => Ok(Some(forced)),
    }
}

fn cmd_convert_auto(
    config: &ConverterConfig,
    path: &Path,
    direction: &str,
    out: &OutputArgs,
) -> Result<bool, Box<dyn std::error::Error>> {
    let options = build_options(config, out)?;
    let forced = parse_direction(direction)?;
    let result = convert_auto(path, forced, &options);
    print_single(&result, out)
}

fn cmd_convert_dir(
    config: &ConverterConfig,
    dir: &Path,
    recursive: bool,
    direction: &str,
    out: &OutputArgs,
) -> Result<bool, Box<dyn std::error::Error>> {
    let options = build_options(config, out)?;
    let forced = parse_direction(direction)?;
    let report = convert_directory(dir, recursive, forced, &options)?;

    if out.json {
        println!("{}", report.to_json()?);
    } else {
        for result in &report.results {
            print_result(result, out.quiet);
        }
        print_summary(&report, out.quiet);
    }
    Ok(report.is_success())
}

fn cmd_detect(path: &Path, json: bool) -> Result<bool, Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("File not found: {}", path.display()).into());
    }
    let detection = FormatDetector::detect_format_with_content(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&detection)?);
        return Ok(true);
    }

    println!("{} {}", "Format:".blue().bold(), detection.format.label());
    println!("{} {:.2}", "Confidence:".blue().bold(), detection.confidence);
    println!(
        "{} {}",
        "Direction:".blue().bold(),
        FormatDetector::determine_conversion_direction(detection.format)
    );
    for (label, path) in [
        ("Base", &detection.base_texture_path),
        ("MER", &detection.mer_texture_path),
        ("Specular", &detection.specular_texture_path),
        ("Normal", &detection.normal_texture_path),
    ] {
        if let Some(p) = path {
            println!("  {}: {}", label, p.display());
        }
    }
    Ok(true)
}

fn print_single(
    result: &ConversionResult,
    out: &OutputArgs,
) -> Result<bool, Box<dyn std::error::Error>> {
    if out.json {
        println!("{}", result.to_json()?);
    } else {
        print_result(result, out.quiet);
    }
    Ok(result.success)
}

fn print_result(result: &ConversionResult, quiet: bool) {
    let source = result.source_path.display();
    if !quiet {
        if let Some(direction) = result.direction {
            println!("{} {} ({})", "INFO".blue().bold(), source, direction);
        }
    }

    for message in &result.messages {
        if let Some(error) = message.strip_prefix("error: ") {
            eprintln!("  {} {}", "FAIL".red().bold(), error);
        } else if quiet {
            continue;
        } else if let Some(warning) = message.strip_prefix("warning: ") {
            println!("  {} {}", "WARN".yellow().bold(), warning);
        } else {
            println!("  {}", message);
        }
    }

    if result.success {
        if !quiet {
            println!("{} {}", "OK".green().bold(), source);
        }
    } else {
        eprintln!("{} {}", "FAIL".red().bold(), source);
    }
}

fn print_summary(report: &BatchReport, quiet: bool) {
    if !quiet {
        for path in &report.skipped {
            println!("{} {} (format unknown)", "SKIP".yellow().bold(), path.display());
        }
    }
    println!("\n--- Summary ---");
    println!("Converted {} texture set(s)", report.succeeded());
    println!("{} failed, {} skipped", report.failed(), report.skipped.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_mer_dir() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let mer = image::RgbImage::from_raw(2, 1, vec![255, 0, 64, 0, 10, 200]).unwrap();
        mer.save(tmp.path().join("iron_mer.png")).unwrap();
        let base = image::RgbImage::from_raw(2, 1, vec![128; 6]).unwrap();
        base.save(tmp.path().join("iron.png")).unwrap();
        tmp
    }

    #[test]
    fn flags_override_config() {
        let config = ConverterConfig::from_toml_str("format = \"jpg\"\nquality = 3").unwrap();
        let out = OutputArgs {
            format: Some("png".into()),
            bake_ao: true,
            ..Default::default()
        };
        let options = build_options(&config, &out).unwrap();
        assert_eq!(options.format, OutputFormat::Png);
        assert_eq!(options.quality, 3);
        assert!(options.bake_ao);
    }

    #[test]
    fn bad_format_flag_is_rejected() {
        let out = OutputArgs {
            format: Some("webp".into()),
            ..Default::default()
        };
        assert!(build_options(&ConverterConfig::default(), &out).is_err());
    }

    #[test]
    fn direction_parsing() {
        assert_eq!(parse_direction("auto").unwrap(), None);
        assert_eq!(
            parse_direction("to-labpbr").unwrap(),
            Some(ConversionDirection::BedrockToLabPbr)
        );
        assert!(parse_direction("up").is_err());
    }

    #[test]
    fn convert_auto_writes_labpbr_outputs() {
        let tmp = create_mer_dir();
        let out_dir = tmp.path().join("out");
        let out = OutputArgs {
            output: Some(out_dir.clone()),
            quiet: true,
            ..Default::default()
        };

        let mer = tmp.path().join("iron_mer.png");
        let ok = cmd_convert_auto(&ConverterConfig::default(), &mer, "auto", &out).unwrap();
        assert!(ok);
        assert!(out_dir.join("iron_s.png").exists());
    }

    #[test]
    fn convert_dir_reports_failure() {
        let tmp = create_mer_dir();
        std::fs::write(tmp.path().join("bad_mer.png"), b"garbage").unwrap();
        let out = OutputArgs {
            json: true,
            ..Default::default()
        };

        let config = ConverterConfig::default();
        let ok = cmd_convert_dir(&config, tmp.path(), false, "auto", &out).unwrap();
        assert!(!ok);
        assert!(tmp.path().join("iron_s.png").exists());
    }

    #[test]
    fn detect_missing_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(cmd_detect(&tmp.path().join("missing.png"), true).is_err());
    }
}
