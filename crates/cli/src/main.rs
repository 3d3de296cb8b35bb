use clap::{Parser, Subcommand};
use colored::Colorize;
use std::{error::Error, process::ExitCode};

mod commands;
mod utils;

use commands::*;
use utils::SessionArgs;

#[derive(Parser)]
#[command(version, about = "Protect, unprotect and inspect ISO 7816-4 secure messaging APDUs")]
struct Cli {
    /// Trace level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wrap command APDUs, in order, within one session
    Protect {
        #[command(flatten)]
        session: SessionArgs,

        /// Command APDUs in hex
        #[arg(required = true)]
        apdus: Vec<String>,
    },

    /// Unwrap response APDUs, in order, within one session
    Unprotect {
        #[command(flatten)]
        session: SessionArgs,

        /// Response APDUs in hex
        #[arg(required = true)]
        responses: Vec<String>,
    },

    /// Wrap a command and unwrap the card's answer to it
    Exchange {
        #[command(flatten)]
        session: SessionArgs,

        /// Command APDU in hex
        apdu: String,

        /// Response APDU in hex
        response: String,
    },

    /// Rewrite the class byte of a command for a logical channel
    Channel {
        /// Command APDU in hex
        apdu: String,

        /// Logical channel number (0-19)
        channel: u8,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match run(&cli) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Vec<String>, Box<dyn Error>> {
    let lines = match &cli.command {
        Commands::Protect { session, apdus } => protect_command(session, apdus)?,
        Commands::Unprotect { session, responses } => unprotect_command(session, responses)?,
        Commands::Exchange {
            session,
            apdu,
            response,
        } => exchange_command(session, apdu, response)?,
        Commands::Channel { apdu, channel } => vec![channel_command(apdu, *channel)?],
    };
    Ok(lines)
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}
