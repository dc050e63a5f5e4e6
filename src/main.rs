//! suitool
//!
//! Command line tools for querying objects, sending coins, publishing Move
//! packages, and signing messages on Sui.

mod commands;
mod utils;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{clock, coin, find_object_owners, msg, publish};

/// suitool - Sui command line tools
#[derive(Parser)]
#[command(name = "suitool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Sui network (mainnet, testnet, devnet, localnet)
    #[arg(long, global = true, default_value = "mainnet", env = "SUI_NETWORK")]
    network: String,

    /// JSON-RPC endpoint (overrides the network default)
    #[arg(long, global = true, env = "SUI_RPC_URL")]
    rpc_url: Option<String>,

    /// GraphQL endpoint (overrides the network default)
    #[arg(long, global = true, env = "SUI_GRAPHQL_URL")]
    graphql_url: Option<String>,

    /// Path to signing key file (Sui keystore or hex secret)
    #[arg(long, global = true, env = "SUI_SIGNING_KEY")]
    signing_key: Option<String>,

    /// Path to the sui binary
    #[arg(long, global = true, default_value = "sui", env = "SUI_BIN")]
    sui_bin: String,

    /// Verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find objects of a specific type and their owners
    FindObjectOwners(find_object_owners::FindObjectOwnersArgs),

    /// Publish all packages in a directory
    Publish(publish::PublishArgs),

    /// Send a coin amount to an address
    CoinSend(coin::CoinSendArgs),

    /// Sign a Sui personal message with your keypair
    MsgSign(msg::MsgSignArgs),

    /// Validate a Sui personal message signature
    MsgVerify(msg::MsgVerifyArgs),

    /// Get the current onchain timestamp in milliseconds
    ClockTime(clock::ClockTimeArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Create context with global options
    let ctx = utils::context::CliContext::new(
        &cli.network,
        cli.rpc_url.as_deref(),
        cli.graphql_url.as_deref(),
        cli.signing_key.as_deref(),
        &cli.sui_bin,
        cli.quiet,
    )?;

    // Execute command
    match cli.command {
        Commands::FindObjectOwners(args) => find_object_owners::execute(&ctx, args).await,
        Commands::Publish(args) => publish::execute(&ctx, args).await,
        Commands::CoinSend(args) => coin::execute(&ctx, args).await,
        Commands::MsgSign(args) => msg::sign(&ctx, args).await,
        Commands::MsgVerify(args) => msg::verify(&ctx, args).await,
        Commands::ClockTime(args) => clock::execute(&ctx, args).await,
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;
            use std::io;

            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_find_object_owners_args() {
        let cli = Cli::try_parse_from([
            "suitool",
            "find-object-owners",
            "-t",
            "0x2::coin::Coin<0x2::sui::SUI>",
            "--limit",
            "10",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::FindObjectOwners(_)));
        assert_eq!(cli.network, "mainnet");
    }

    #[test]
    fn test_coin_send_args() {
        let cli = Cli::try_parse_from([
            "suitool",
            "coin-send",
            "-a",
            "0.5",
            "-c",
            "0x2::sui::SUI",
            "-r",
            "0xb0b",
            "--network",
            "testnet",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::CoinSend(_)));
        assert_eq!(cli.network, "testnet");
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["suitool", "-v", "-q", "clock-time"]).is_err());
    }
}
