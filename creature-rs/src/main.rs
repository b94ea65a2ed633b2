//! Main entry point for the creature-rs CLI

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use std::io;

use creature_rs::cli::{Cli, Commands};
use creature_rs::commands;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match (cli.verbose, cli.quiet) {
        (0, true) => log::LevelFilter::Error,
        (0, false) => log::LevelFilter::Warn,
        (1, _) => log::LevelFilter::Info,
        (2, _) => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    // RUST_LOG, when set, overrides the flags
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_env(env_logger::Env::default());
    builder.init();

    match cli.command {
        Commands::Info(args) => commands::info::execute(&args),
        Commands::Tree(args) => commands::tree::execute(&args),
        Commands::Pose(args) => commands::pose::execute(&args),
        Commands::Bake(args) => commands::bake::execute(&args, cli.quiet),
        Commands::Contact(args) => commands::contact::execute(&args),
        Commands::Completions { shell } => {
            print_completions(shell, &mut Cli::command());
            Ok(())
        }
    }
}

fn print_completions<G: Generator>(generator: G, cmd: &mut clap::Command) {
    generate(
        generator,
        cmd,
        cmd.get_name().to_string(),
        &mut io::stdout(),
    );
}
