//! Acervo CLI - legal-document acquisition from the command line

use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{cmd_run, RunArgs};

#[derive(Parser)]
#[command(name = "acervo")]
#[command(about = "Multi-source legal-document acquisition pipeline", version)]
struct Cli {
  /// Verbose logging (debug level)
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run an acquisition job against one source
  Run(RunArgs),
  /// List the available sources and the discovery modes they support
  Sources,
}

#[tokio::main]
async fn main() {
  let cli = Cli::parse();

  let code = match cli.command {
    Commands::Run(args) => match cmd_run(args, cli.verbose).await {
      Ok(code) => code,
      Err(e) => {
        eprintln!("error: {e:#}");
        1
      }
    },
    Commands::Sources => {
      commands::cmd_sources();
      0
    }
  };

  std::process::exit(code);
}
