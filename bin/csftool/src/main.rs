use cadscene::LoadSettings;

use crate::prelude::*;

#[allow(unused_imports)]
mod prelude {
    pub use std::path::{Path, PathBuf};

    pub use anyhow::{Context, Result as AnyResult, bail};
}

mod cmd {
    pub mod convert;
    pub mod info;
    pub mod transform;
    pub mod verify;
}

mod util;

#[derive(clap::Parser, Debug)]
#[command(about = "Tool for working with CAD scene (CSF) files.")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    /// Operation to perform
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Args, Debug)]
struct CommonArgs {
    /// Print extra info about what the tool is doing
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::Args, Debug)]
struct ReadArgs {
    /// Skip offset and index validation (only for trusted files)
    #[arg(long)]
    no_validate: bool,
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Overwrite output file if it exists
    #[arg(short, long)]
    overwrite: bool,
}

#[derive(clap::Args, Debug)]
struct InputPath {
    /// Path to the input file (.csf or .csf.gz)
    in_file: PathBuf,
}

#[derive(clap::Args, Debug)]
struct OutputPath {
    /// Path where to save the output file
    out_file: PathBuf,
}

#[derive(clap::Args, Debug)]
struct InOutPaths {
    /// Path to the input file
    in_file: PathBuf,
    /// Path to the output file (if unspecified, overwrite the input)
    out_file: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum CliCommand {
    /// Print information about the tool
    Version,
    /// Show general info about the file
    Info(cmd::info::InfoArgs),
    /// Try decoding the file to check for errors
    Verify(cmd::verify::VerifyArgs),
    /// Load a file, save it in the other representation
    Convert(cmd::convert::ConvertArgs),
    /// Recompute world transforms from the node hierarchy
    Transform(cmd::transform::TransformArgs),
}

impl From<&ReadArgs> for LoadSettings {
    fn from(args: &ReadArgs) -> Self {
        Self {
            validate: !args.no_validate,
        }
    }
}

fn run_command(cli: &Cli) -> AnyResult<()> {
    match &cli.command {
        CliCommand::Version => {
            // Verbose always prints version anyway
            if !cli.common.verbose {
                print_version();
            }
            Ok(())
        }
        CliCommand::Info(args) => cmd::info::run(&cli.common, args),
        CliCommand::Verify(args) => cmd::verify::run(&cli.common, args),
        CliCommand::Convert(args) => cmd::convert::run(&cli.common, args),
        CliCommand::Transform(args) => cmd::transform::run(&cli.common, args),
    }
}

fn print_version() {
    eprintln!(
        "{} version {}. Writes file format version {}, reads versions {} to {}.",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        cadscene::VERSION,
        cadscene::VERSION_COMPAT,
        cadscene::VERSION,
    );
    eprintln!();
}

fn main() {
    use clap::Parser;
    let cli = Cli::parse();

    if cli.common.verbose {
        print_version();
    }

    if let Err(e) = run_command(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(2);
    }
}
