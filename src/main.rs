use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use taskflow::builder::Builder;
use taskflow::config::Config;
use taskflow::declare::{JobContext, JobFile};
use taskflow::log::LogLevel;
use taskflow::model::LanguageRegistry;
use taskflow::{tlog, tlog_warn, Result};

/// taskflow - build and compile task-flow jobs for a remote scheduler
#[derive(Parser, Debug)]
#[command(name = "taskflow")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    TASKFLOW_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.taskflow/taskflow.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Compile a TOML job definition into the native job document
    Compile {
        /// Path to the job definition
        job: PathBuf,

        /// Write the JSON document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the supported script language tokens
    Languages,
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    taskflow::log::init_with_debug(cli.debug);
    let config = Config::load()?;
    if !cli.debug {
        if let Some(level) = &config.log_level {
            match level.parse::<LogLevel>() {
                Ok(level) => taskflow::log::set_level(level),
                Err(e) => tlog_warn!("Ignoring log_level from config: {}", e),
            }
        }
    }

    match cli.command {
        Command::Compile { job, output } => run_compile(&config, job, output),
        Command::Languages => run_languages(),
        Command::Config => run_config(&config),
    }
}

fn run_compile(config: &Config, path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    tlog!("Compile command: job={}", path.display());
    let mut context = JobContext::with_config(config)?;
    let job = JobFile::load(&path)?.into_job(&mut context)?;
    let native = Builder::new().compile(&job)?;
    let json = native.to_json()?;

    match output {
        Some(out) => {
            fs::write(&out, json)?;
            println!(
                "Compiled job {} ({} tasks) to {}",
                native.name,
                native.task_count(),
                out.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn run_languages() -> Result<()> {
    for token in LanguageRegistry::default().tokens() {
        println!("{}", token);
    }
    Ok(())
}

fn run_config(config: &Config) -> Result<()> {
    println!("# {}", Config::config_path()?.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
