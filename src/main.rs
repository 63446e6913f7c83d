//! Stacktrace Translator CLI
//!
//! Translates Spring crash stacktraces locally, serves translations over
//! JSON-RPC, or forwards logs to a running service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use stacktrace_translator::commands::{
    self, display_version, execute_remote, execute_serve, execute_translate, RemoteArgs, ServeArgs,
    TranslateArgs,
};
use stacktrace_translator::utils::config::{Config, DEFAULT_SERVICE_URL};

/// Stacktrace Translator - source locations for Spring crash logs
#[derive(Parser, Debug)]
#[command(name = "stacktrace-translator")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "STACKTRACE_TRANSLATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate an infolog against the local symbol tree
    Translate {
        /// Path to the infolog
        infolog: PathBuf,

        /// Root of the debug-symbol tree
        #[arg(short, long, env = "STACKTRACE_TRANSLATOR_SYMBOLS")]
        symbols: Option<PathBuf>,

        /// Platform directory to look in
        #[arg(short, long)]
        platform: Option<String>,

        /// Output path for a JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the JSON-RPC translation service
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "STACKTRACE_TRANSLATOR_LISTEN")]
        listen: Option<String>,

        /// Write the server PID to this file
        #[arg(long)]
        pid_file: Option<PathBuf>,
    },

    /// Translate an infolog through a running service
    Remote {
        /// Path to the infolog
        infolog: PathBuf,

        /// Service URL
        #[arg(short, long, default_value = DEFAULT_SERVICE_URL, env = "STACKTRACE_TRANSLATOR_URL")]
        url: String,

        /// Output path for a JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let load_config = || Config::load(cli.config.as_deref()).context("Failed to load configuration");

    match cli.command {
        Commands::Translate {
            infolog,
            symbols,
            platform,
            output,
        } => {
            let args = TranslateArgs {
                infolog,
                symbols,
                platform,
                output_json: output,
            };

            // Validate args first
            commands::translate::validate_args(&args)?;
            execute_translate(load_config()?, args)?;
        }

        Commands::Serve { listen, pid_file } => {
            execute_serve(load_config()?, ServeArgs { listen, pid_file })?;
        }

        Commands::Remote { infolog, url, output } => {
            let args = RemoteArgs {
                url,
                infolog,
                output_json: output,
            };

            commands::remote::validate_args(&args)?;
            execute_remote(args)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
