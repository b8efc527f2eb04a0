use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use wkl_core::{KbdTables, PointerWidth, ReverseConfig, WinKeyMap};
use wkl_image::{load_layout, resolve_input, LoadOptions};
use wkl_reverse::{
    read_headers, write_char_table, write_json, write_keyboard_map, SourceGenerator, SourceOptions,
};

/// Rebuild the source of a Windows keyboard layout from its DLL.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File name of a keyboard layout DLL, or the name of a keyboard layout,
    /// for instance "fr" for C:\Windows\System32\kbdfr.dll
    #[arg(value_name = "KBD_NAME_OR_FILE")]
    input: String,

    /// Comment string in the header
    #[arg(short, long)]
    comment: Option<String>,

    /// Add hexa dump in final comments
    #[arg(short, long)]
    dump: bool,

    /// Generate a list of characters instead of a C source file
    #[arg(short, long)]
    list: bool,

    /// Generate a keyboard map based on the specified template
    #[arg(short, long, value_name = "TEMPLATE")]
    map: Option<PathBuf>,

    /// Generate the key map as JSON instead of a C source file
    #[arg(short, long)]
    json: bool,

    /// Numerical output only, do not attempt to translate to source macros
    #[arg(short, long)]
    numeric: bool,

    /// Output file name, default is standard output
    #[arg(short, long, value_name = "FILE", conflicts_with = "update")]
    output: Option<PathBuf>,

    /// Same as --output but update the file, keeping its leading comments
    #[arg(short, long, value_name = "FILE")]
    update: Option<PathBuf>,

    /// Keyboard type, defaults to dwType in the tables or 4 if unspecified
    #[arg(short = 't', long = "type", value_name = "VALUE")]
    kbd_type: Option<u32>,

    /// Size of pointers in the tables, default from the DLL machine type
    #[arg(long, value_name = "32|64", value_parser = parse_pointer_size)]
    pointer_size: Option<PointerWidth>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of standard error
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn parse_pointer_size(value: &str) -> std::result::Result<PointerWidth, String> {
    value
        .parse()
        .ok()
        .and_then(PointerWidth::from_bits)
        .ok_or_else(|| format!("invalid pointer size '{}', expected 32 or 64", value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_file.as_deref())?;
    run(cli)
}

/// Logs go to stderr, or to a file through a background writer. The guard
/// flushes the file when dropped.
fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            builder.with_writer(writer).with_ansi(false).init();
            Ok(Some(guard))
        }
        None => {
            builder.with_writer(io::stderr).init();
            Ok(None)
        }
    }
}

fn load_config(cli: &Cli) -> Result<ReverseConfig> {
    let mut config = match &cli.config {
        Some(path) => ReverseConfig::load(path)?,
        None => ReverseConfig::default(),
    };
    if let Some(comment) = &cli.comment {
        config.output.comment = comment.clone();
    }
    if cli.numeric {
        config.output.numeric_only = true;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    // Headers must be read before the previous output is truncated.
    let headers = match &cli.update {
        Some(path) if path.exists() => {
            let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            read_headers(&mut BufReader::new(file)).with_context(|| format!("Failed to read {}", path.display()))?
        }
        _ => Vec::new(),
    };

    let input = resolve_input(&cli.input);
    let options = LoadOptions { pointer_width: cli.pointer_size };
    let layout = load_layout(&input, &options)?;
    let Some(tables) = KbdTables::decode(&layout.image, layout.tables, &config.decode) else {
        bail!("Cannot read keyboard tables at 0x{:X} in {}", layout.tables, input.display());
    };

    let output = cli.output.as_ref().or(cli.update.as_ref());
    let mut out: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    if cli.list {
        let map = WinKeyMap::new(&tables).build_key_map();
        write_char_table(&mut out, &map).context("Failed to write character table")?;
    } else if let Some(template) = &cli.map {
        let map = WinKeyMap::new(&tables).build_key_map();
        let file = File::open(template).with_context(|| format!("Failed to open {}", template.display()))?;
        let invalid = write_keyboard_map(&mut out, &mut BufReader::new(file), &template.display().to_string(), &map)
            .context("Failed to write keyboard map")?;
        out.flush()?;
        if invalid > 0 {
            bail!("{} invalid cells in {}", invalid, template.display());
        }
    } else if cli.json {
        let map = WinKeyMap::new(&tables).build_key_map();
        write_json(&mut out, &map)?;
    } else {
        let options = SourceOptions {
            input_name: input.display().to_string(),
            headers,
            kbd_type: cli.kbd_type,
            hexa_dump: cli.dump,
        };
        debug!("Generating source, numeric only: {}", config.output.numeric_only);
        let mut generator = SourceGenerator::new(&config, options);
        generator.generate(&mut out, &tables, &layout.image).context("Failed to write source file")?;
    }

    out.flush().context("Failed to write output")?;
    if let Some(path) = output {
        info!("Generated {}", path.display());
    }
    Ok(())
}
