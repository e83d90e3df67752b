//! ringvm: run integer-cell programs alone or as amplifier pipelines.

use clap::{Parser as ClapParser, Subcommand};
use ringvm_cli::colors::{bold, green, red, status_label};
use ringvm_cli::{commands, logging, CliError, RingvmConfig};
use std::path::{Path, PathBuf};

#[derive(ClapParser)]
#[command(name = "ringvm", version, about = "Integer-cell virtual machine and pipeline runner")]
struct Cli {
    /// Use this config file instead of searching for ringvm.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program once with fixed inputs
    Run {
        /// Path to the program file
        file: PathBuf,
        /// Input value (repeatable, consumed in order)
        #[arg(short, long = "input", allow_negative_numbers = true)]
        inputs: Vec<i64>,
        /// Print the execution as JSON
        #[arg(long)]
        json: bool,
        /// Also print the final memory image
        #[arg(long)]
        memory: bool,
    },
    /// Print an instruction listing
    Disasm {
        /// Path to the program file
        file: PathBuf,
    },
    /// Run one pipeline with the given phase settings
    Amplify {
        /// Path to the program file
        file: PathBuf,
        /// Comma-separated phase settings, one per machine
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        phases: Vec<i64>,
        /// Connect the last machine back to the first
        #[arg(long)]
        feedback: bool,
        #[arg(long)]
        json: bool,
    },
    /// Find the phase ordering with the largest output
    Search {
        /// Path to the program file
        file: PathBuf,
        /// Comma-separated candidate phase settings
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        candidates: Vec<i64>,
        #[arg(long)]
        feedback: bool,
        #[arg(long)]
        json: bool,
    },
    /// Create a ringvm.toml config file in the current directory
    Init,
}

fn main() {
    let cli = Cli::parse();

    let config = match RingvmConfig::resolve(cli.config.as_deref()) {
        Ok((_, config)) => config,
        Err(e) => fail(e.into()),
    };
    logging::init(config.log.filter.as_deref());

    let result = match cli.command {
        Commands::Run {
            file,
            inputs,
            json,
            memory,
        } => with_program(&file, |program| {
            commands::run(&program, &inputs, &config, json, memory)
        }),
        Commands::Disasm { file } => with_program(&file, |program| Ok(commands::disasm(&program))),
        Commands::Amplify {
            file,
            phases,
            feedback,
            json,
        } => with_program(&file, |program| {
            commands::amplify(program, &phases, feedback, &config, json)
        }),
        Commands::Search {
            file,
            candidates,
            feedback,
            json,
        } => with_program(&file, |program| {
            commands::search(program, &candidates, feedback, &config, json)
        }),
        Commands::Init => cmd_init(),
    };

    match result {
        Ok(text) => print!("{}", text),
        Err(e) => fail(e),
    }
}

fn with_program<F>(file: &Path, f: F) -> Result<String, CliError>
where
    F: FnOnce(ringvm_core::Program) -> Result<String, CliError>,
{
    f(commands::load_program(file)?)
}

fn cmd_init() -> Result<String, CliError> {
    let cwd = std::env::current_dir().map_err(|source| CliError::Read {
        path: PathBuf::from("."),
        source,
    })?;
    let path = commands::init(&cwd)?;
    Ok(format!(
        "{} {}\n",
        status_label("Created"),
        green(&bold(&path.display().to_string()))
    ))
}

fn fail(e: CliError) -> ! {
    eprintln!("{} {}", red("error:"), e);
    std::process::exit(1);
}
