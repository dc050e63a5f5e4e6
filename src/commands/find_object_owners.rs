//! Find-object-owners command - List every object of a type with its owner

use anyhow::{Context, Result};
use clap::Args;

use crate::utils::context::CliContext;
use crate::utils::graphql::{find_object_owners, GraphQlClient};

#[derive(Args)]
pub struct FindObjectOwnersArgs {
    /// The object type to search for, e.g. "0x123::module::Struct"
    #[arg(short = 't', long = "type")]
    object_type: String,

    /// GraphQL endpoint to query (defaults to the network's endpoint)
    #[arg(short, long)]
    rpc: Option<String>,

    /// Maximum number of objects to fetch. Use 0 for no limit.
    #[arg(short, long, default_value = "0")]
    limit: usize,
}

pub async fn execute(ctx: &CliContext, args: FindObjectOwnersArgs) -> Result<()> {
    let client = match &args.rpc {
        Some(url) => GraphQlClient::new(url),
        None => ctx.graphql_client(),
    };
    tracing::info!(
        "Finding owners of {} via {} (limit: {})",
        args.object_type,
        client.endpoint(),
        args.limit
    );

    let results = find_object_owners(&client, &args.object_type, args.limit)
        .await
        .with_context(|| format!("Failed to find objects of type {}", args.object_type))?;

    tracing::info!("Found {} objects", results.len());
    println!("{}", serde_json::to_string(&results)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: FindObjectOwnersArgs,
    }

    #[test]
    fn test_short_flags() {
        let cli = TestCli::try_parse_from([
            "find-object-owners",
            "-t",
            "0x2::coin::Coin<0x2::sui::SUI>",
            "-r",
            "http://localhost:9125/graphql",
            "-l",
            "25",
        ])
        .unwrap();
        assert_eq!(cli.args.object_type, "0x2::coin::Coin<0x2::sui::SUI>");
        assert_eq!(cli.args.rpc.as_deref(), Some("http://localhost:9125/graphql"));
        assert_eq!(cli.args.limit, 25);
    }

    #[test]
    fn test_long_type_flag_and_defaults() {
        let cli = TestCli::try_parse_from(["find-object-owners", "--type", "0x2::kiosk::Kiosk"]).unwrap();
        assert_eq!(cli.args.object_type, "0x2::kiosk::Kiosk");
        assert!(cli.args.rpc.is_none());
        assert_eq!(cli.args.limit, 0);
    }

    #[test]
    fn test_type_is_required() {
        assert!(TestCli::try_parse_from(["find-object-owners", "-l", "5"]).is_err());
    }
}
