use clap::{Parser, Subcommand, ValueEnum};
use colored_json::{Color, ColorMode, Output, Styler, ToColoredJson};
use iab_tcf::gvl::Gvl;
use iab_tcf::{TCModel, TCString};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

type CmdResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// When to colour JSON output
    #[arg(long, global = true, value_enum, default_value_t = Coloring::Auto)]
    color: Coloring,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a TC string and display it in the console
    Decode {
        /// TC string to decode
        tc_string: String,
        /// Vendor list file to validate publisher restrictions against
        #[arg(short = 'l', long)]
        vendor_list: Option<PathBuf>,
    },
    /// List all segments
    Segments {
        /// TC string to parse
        tc_string: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Coloring {
    Auto,
    Always,
    Never,
}

impl From<Coloring> for ColorMode {
    fn from(c: Coloring) -> Self {
        match c {
            Coloring::Auto => ColorMode::Auto(Output::StdOut),
            Coloring::Always => ColorMode::On,
            Coloring::Never => ColorMode::Off,
        }
    }
}

fn main() -> ExitCode {
    let args = Cli::parse();
    setup_logging(args.verbose);

    let result = match &args.cmd {
        Commands::Decode {
            tc_string,
            vendor_list,
        } => decode_tc_string(tc_string, vendor_list.as_deref(), args.color),
        Commands::Segments { tc_string } => list_segments(tc_string),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "error" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn decode_tc_string(s: &str, vendor_list: Option<&Path>, color: Coloring) -> CmdResult {
    let tc_str = TCString::parse_str(s)?;

    let mut model = TCModel::new();
    if let Some(path) = vendor_list {
        let gvl: Gvl = std::fs::read_to_string(path)?.parse()?;
        debug!(version = gvl.vendor_list_version(), "loaded vendor list");
        model.set_gvl(Arc::new(gvl))?;
    }
    tc_str.decode_into(&mut model)?;

    print_json(&model, color)
}

fn list_segments(s: &str) -> CmdResult {
    let tc_str = TCString::parse_str(s)?;

    for (segment, raw) in tc_str.segments() {
        println!("{}\t{}", segment, raw);
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T, color: Coloring) -> CmdResult {
    let styler = Styler {
        key: Color::Cyan.foreground(),
        string_value: Color::Green.foreground(),
        integer_value: Color::Yellow.foreground(),
        bool_value: Color::Magenta.bold(),
        nil_value: Color::Red.italic(),
        ..Default::default()
    };

    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json.to_colored_json_with_styler(color.into(), styler)?);
    Ok(())
}
