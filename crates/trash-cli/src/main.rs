#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::PathBuf;
use trash_core::manifest::DEFAULT_MANIFEST;
use trash_core::{paths, Config, PlatformVariant};

#[derive(Parser, Debug)]
#[command(name = "trash")]
#[command(author, version, about = "Vendor Go dependencies and keep only what the code uses", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Manifest file, relative to the project directory
    #[arg(short = 'f', long, global = true, default_value = DEFAULT_MANIFEST, value_name = "FILE")]
    file: PathBuf,

    /// Project directory
    #[arg(short = 'C', long, global = true, default_value = ".", value_name = "DIR")]
    directory: PathBuf,

    /// Vendor directory, relative to the project directory
    #[arg(short = 'T', long, global = true, default_value = "vendor", value_name = "DIR")]
    target: PathBuf,

    /// Repository cache directory [default: ~/.trash-cache]
    #[arg(long, global = true, env = paths::CACHE_DIR_ENV, value_name = "DIR")]
    cache: Option<PathBuf>,

    /// GOPATH, used to guess the root package when the manifest has none
    #[arg(long, global = true, env = "GOPATH", hide = true)]
    gopath: Option<String>,

    /// Platform whose build constraints select files (os/arch or "any"); repeatable
    #[arg(long = "platform", global = true, value_name = "OS/ARCH")]
    platforms: Vec<PlatformVariant>,

    #[command(flatten)]
    vendor: commands::vendor::VendorArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch pinned packages into the vendor directory and prune it (default)
    Vendor(commands::vendor::VendorArgs),

    /// Prune the vendor directory without fetching anything
    Clean,

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::Version)) {
        return commands::version::run();
    }

    let dir = dunce::canonicalize(&cli.directory)
        .into_diagnostic()
        .wrap_err_with(|| format!("project directory {} is not usable", cli.directory.display()))?;

    let args = match &cli.command {
        Some(Commands::Vendor(args)) => args.merged(&cli.vendor),
        _ => cli.vendor.clone(),
    };

    let config = Config::new(dir)
        .with_manifest_file(cli.file)
        .with_target(cli.target)
        .with_cache_dir(cli.cache.unwrap_or_else(paths::default_cache_dir))
        .with_gopath(cli.gopath)
        .with_platforms(cli.platforms)
        .with_keep(args.keep)
        .with_update(args.update)
        .with_insecure(args.insecure)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Clean) => commands::clean::run(&config, cli.json),
        Some(Commands::Vendor(_)) | None => commands::vendor::run(&config, cli.json),
        Some(Commands::Version) => unreachable!("handled above"),
    }
}
