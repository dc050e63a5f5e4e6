//! Publish command - Publish every Move package under a directory

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;
use std::path::PathBuf;

use crate::utils::context::CliContext;
use crate::utils::jsonrpc::RpcSubmitter;
use crate::utils::publisher::{PackagePublisher, PackageRegistry, PublishOutcome};

#[derive(Args)]
pub struct PublishArgs {
    /// Directory containing the packages (defaults to the current directory)
    #[arg(short, long)]
    path: Option<String>,

    /// Directory where the created objects' types and IDs are saved
    #[arg(short = 'd', long)]
    created_objects_dir: Option<String>,

    /// Gas budget per publish transaction, in MIST
    #[arg(long, default_value = "500000000")]
    gas_budget: u64,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

pub async fn execute(ctx: &CliContext, args: PublishArgs) -> Result<()> {
    let root = match args.path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    let registry = PackageRegistry::load(&root)
        .with_context(|| format!("Failed to load packages from {:?}", root))?;
    if registry.is_empty() {
        return Err(anyhow!("No Move packages found under {:?}", root));
    }
    tracing::info!("Loaded {} packages from {:?}", registry.len(), root);

    let keypair = ctx.load_signing_key()?;
    let submitter = RpcSubmitter::new(ctx.rpc_client(), keypair, args.gas_budget);
    if !ctx.quiet {
        println!("Active network: {}", ctx.network());
        println!("Active address: {}", submitter.sender());
    }

    let mut publisher = PackagePublisher::new(registry, ctx.sui_cli(), submitter)
        .with_created_objects_dir(args.created_objects_dir.map(PathBuf::from))
        .with_quiet(ctx.quiet);

    let skip_prompt = args.yes;
    let outcome = publisher
        .publish_all(|| {
            if skip_prompt {
                return Ok(true);
            }
            println!(
                "\n{}",
                "WARNING: Publishing packages will delete Move.lock files and previously published data will be lost."
                    .yellow()
            );
            Confirm::new()
                .with_prompt("Are you sure you want to continue?")
                .default(false)
                .interact()
                .context("Failed to read confirmation")
        })
        .await?;

    match outcome {
        PublishOutcome::Completed => Ok(()),
        PublishOutcome::Cancelled => Ok(()),
        PublishOutcome::Failed(failure) => Err(anyhow::Error::new(failure.error).context(format!(
            "Publishing stopped at {} while {}",
            failure.package, failure.stage
        ))),
    }
}
