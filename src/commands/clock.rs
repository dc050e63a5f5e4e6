//! Clock-time command - Read the on-chain timestamp

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use clap::{Args, ValueEnum};

use crate::utils::context::CliContext;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TimeFormat {
    /// Milliseconds since the Unix epoch
    #[default]
    Ts,
    /// RFC 3339 in UTC
    Iso,
    /// Local time
    Local,
}

#[derive(Args)]
pub struct ClockTimeArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = TimeFormat::Ts)]
    format: TimeFormat,
}

pub async fn execute(ctx: &CliContext, args: ClockTimeArgs) -> Result<()> {
    let client = ctx.graphql_client();
    tracing::debug!("Reading clock from {}", client.endpoint());

    let timestamp_ms = client.clock_timestamp_ms().await?;
    println!("{}", format_timestamp(timestamp_ms, args.format)?);
    Ok(())
}

pub fn format_timestamp(timestamp_ms: u64, format: TimeFormat) -> Result<String> {
    if format == TimeFormat::Ts {
        return Ok(timestamp_ms.to_string());
    }

    let millis = i64::try_from(timestamp_ms)?;
    let utc = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow!("Timestamp out of range: {}", timestamp_ms))?;

    Ok(match format {
        TimeFormat::Iso => utc.to_rfc3339_opts(SecondsFormat::Millis, true),
        TimeFormat::Local => utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S%.3f %Z").to_string(),
        TimeFormat::Ts => timestamp_ms.to_string(),
    })
}
