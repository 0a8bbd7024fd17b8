//! CLI for biz, the bulk image bundler.

mod commands;
mod prompt;

use anyhow::Result;
use biz_core::config;
use biz_core::package::OutputFormat;
use biz_core::pipeline::SchedulePolicy;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_completions, run_interactive, run_process, ProcessArgs};

/// Top-level CLI for biz.
#[derive(Debug, Parser)]
#[command(name = "biz")]
#[command(about = "biz: download images from URL lists and bundle them into a PDF or ZIP", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every URL from the given lists and bundle the images.
    Process {
        /// Text file(s) with one image URL per line. Repeat or list several.
        #[arg(short, long = "input", required = true, num_args = 1.., value_name = "FILE")]
        input: Vec<PathBuf>,

        /// Output file name, without extension.
        #[arg(short, long, default_value = "output", value_name = "NAME")]
        output: String,

        /// Output format: pdf or zip (default from config).
        #[arg(short, long, value_name = "FORMAT")]
        format: Option<OutputFormat>,

        /// Maximum images processed at once (default from config).
        #[arg(short, long, value_name = "N")]
        concurrency: Option<usize>,

        /// JPEG quality 1-100 (default from config).
        #[arg(short, long, value_name = "Q", value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,

        /// Scheduling: pool keeps N downloads busy, chunked runs strict groups of N.
        #[arg(long, value_name = "POLICY")]
        schedule: Option<SchedulePolicy>,

        /// Directory for the finished PDF/ZIP.
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Scratch directory for transcoded images (removed after the run).
        #[arg(long, value_name = "DIR")]
        staging_dir: Option<PathBuf>,
    },

    /// Pick URL lists from the source directory and answer prompts for the rest.
    Interactive,

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Completions { shell } = cli.command {
            run_completions(shell, &mut Cli::command());
            return Ok(());
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Process {
                input,
                output,
                format,
                concurrency,
                quality,
                schedule,
                output_dir,
                staging_dir,
            } => {
                let args = ProcessArgs {
                    input,
                    output,
                    format,
                    concurrency,
                    quality,
                    schedule,
                    output_dir,
                    staging_dir,
                };
                run_process(&cfg, args).await?;
            }
            CliCommand::Interactive => run_interactive(&cfg).await?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
