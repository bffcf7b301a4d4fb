mod address;
mod cli;
mod config;
mod context;
mod inbox;
mod intake;
mod locks;
mod model;
mod parse;
mod reconcile;
mod sheet;
mod storage;

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Env};
use config::Config;
use intake::Intake;
use sheet::JsonlSheet;
use storage::Storage;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config.clone().or_else(Config::default_path) {
        Some(p) => p,
        None => {
            eprintln!("Could not determine home directory.");
            process::exit(1);
        }
    };

    let config = match Config::load(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let root = config.root();
    let storage = match Storage::new(&root) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to initialize storage: {e}");
            process::exit(1);
        }
    };

    let sheet = match JsonlSheet::new(root.join("sheet")) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open sheet output: {e}");
            process::exit(1);
        }
    };

    let intake = Intake::new(&storage, &sheet);
    let env = Env {
        config,
        config_path,
        storage: &storage,
        sheet: &sheet,
        intake: &intake,
    };

    if let Err(e) = cli::run(cli.command, &env) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
