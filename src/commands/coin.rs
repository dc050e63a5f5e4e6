//! Coin-send command - Send a coin amount to an address

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::utils::coin::send_coin;
use crate::utils::context::CliContext;
use crate::utils::jsonrpc::RpcSubmitter;

#[derive(Args)]
pub struct CoinSendArgs {
    /// The number of coins to send (e.g. 0.5 for 0.5 SUI)
    #[arg(short, long)]
    amount: String,

    /// The type of the coin (the T in Coin<T>)
    #[arg(short, long)]
    coin_type: String,

    /// The address of the recipient
    #[arg(short, long)]
    recipient: String,

    /// Gas budget for the transfer, in MIST
    #[arg(long, default_value = "50000000")]
    gas_budget: u64,
}

pub async fn execute(ctx: &CliContext, args: CoinSendArgs) -> Result<()> {
    let keypair = ctx.load_signing_key()?;
    let wallet = RpcSubmitter::new(ctx.rpc_client(), keypair, args.gas_budget);
    let sender = wallet.sender();

    if !ctx.quiet {
        println!("{}", "Sending coins...".cyan());
        println!("  Network: {}", ctx.network());
        println!("  From: {}", sender);
        println!("  To: {}", args.recipient);
        println!("  Amount: {} {}", args.amount, args.coin_type);
    }

    let receipt = send_coin(
        &wallet,
        &sender,
        &args.coin_type,
        &args.amount,
        &args.recipient,
        args.gas_budget,
    )
    .await
    .with_context(|| format!("Failed to send {} {}", args.amount, args.coin_type))?;

    tracing::info!(
        "Sent {} base units of {} to {}",
        receipt.amount,
        args.coin_type,
        receipt.recipient
    );
    if !ctx.quiet {
        println!(
            "\n{} {} {} to {}",
            "✓ Sent".green(),
            args.amount,
            receipt.symbol,
            receipt.recipient
        );
    }
    println!("Transaction: {}", receipt.digest);
    Ok(())
}
