//! Tapedeck CLI

use std::path::PathBuf;
use std::process;

use tapedeck::config::Config;
use tapedeck::{Deck, DeckError};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "check" => {
            if args.len() < 3 {
                eprintln!("Usage: tapedeck check <config.toml>");
                process::exit(1);
            }

            if let Err(e) = check(&PathBuf::from(&args[2])) {
                eprintln!("{e}");
                process::exit(1);
            }
        }
        "backends" => {
            let deck = Deck::new();
            for library in deck.registry().accepted_libraries() {
                println!("{library}");
            }
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'tapedeck' for usage information.");
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Tapedeck v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: tapedeck <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  check <config.toml>   Load a config and configure its stubbing library");
    eprintln!("  backends              List registered stubbing libraries");
}

/// Load `path`, resolve its stubbing library and apply the configuration
fn check(path: &std::path::Path) -> Result<(), DeckError> {
    let config = Config::from_file(path)?;
    let deck = Deck::new();
    deck.configure(|current| *current = config)?;

    let adapter = deck.adapter()?;
    let config = deck.config();

    println!("Config:              {}", path.display());
    println!("Stubbing library:    {}", adapter.library());
    println!("Connections allowed: {}", adapter.connections_allowed());
    println!("Ignore localhost:    {}", adapter.ignore_localhost());
    println!(
        "Cassette directory:  {}",
        config.cassette_library_dir.display()
    );

    Ok(())
}
