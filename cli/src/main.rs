//! # EquiBasket CLI
//!
//! Entry point for the `equibasket` binary. Parses CLI arguments,
//! initializes logging and dispatches to the handlers in `commands`.
//!
//! - `encode`   : JSON record to hex CBOR
//! - `decode`   : hex CBOR to JSON
//! - `price`    : basket price at an oracle snapshot
//! - `health`   : collateral ratio against a threshold
//! - `simulate` : open a vault and mint on an in-memory ledger
//! - `version`  : print build version information

mod cli;
mod commands;
mod logging;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Commands, EquiBasketCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = EquiBasketCli::parse();
    logging::init_logging("equibasket=info,equibasket_protocol=warn", cli.log_format);

    match cli.command {
        Commands::Encode(args) => {
            let json = read_input(&args.json)?;
            println!("{}", commands::encode(args.kind, &json)?);
        }
        Commands::Decode(args) => {
            println!("{}", commands::decode(args.kind, &args.hex)?);
        }
        Commands::Price(args) => {
            let out = commands::price(&args.oracle, &args.basket)?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Health(args) => {
            let out = commands::health(&args);
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Simulate(args) => {
            let network = commands::load_network(&args)?;
            tracing::info!(ada = args.ada, mint = %args.mint, "starting dry run");
            let out = commands::simulate(&args, network).await?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Version => {
            for line in commands::version_lines() {
                println!("{line}");
            }
        }
    }

    Ok(())
}

/// Reads a file, or stdin when the path is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
