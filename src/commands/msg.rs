//! Msg-sign / msg-verify commands - Sui personal message signatures
//!
//! Both commands report through a single JSON object on stdout and exit
//! with status 1 on failure, so scripts can rely on the output shape.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::utils::context::CliContext;
use crate::utils::crypto::verify_personal_message;

#[derive(Args)]
pub struct MsgSignArgs {
    /// Message to sign
    #[arg(short, long)]
    message: String,
}

#[derive(Args)]
pub struct MsgVerifyArgs {
    /// Message that was signed
    #[arg(short, long)]
    message: String,

    /// Signer address
    #[arg(short, long)]
    address: String,

    /// Base64 serialized signature to verify
    #[arg(short, long)]
    signature: String,
}

pub async fn sign(ctx: &CliContext, args: MsgSignArgs) -> Result<()> {
    let result = ctx
        .load_signing_key()
        .and_then(|keypair| keypair.sign_personal_message(args.message.as_bytes()));

    match result {
        Ok(signature) => {
            println!("{}", json!({ "signature": signature }));
            Ok(())
        }
        Err(e) => {
            println!("{}", json!({ "signature": null, "error": format!("{:#}", e) }));
            std::process::exit(1);
        }
    }
}

pub async fn verify(_ctx: &CliContext, args: MsgVerifyArgs) -> Result<()> {
    match verify_personal_message(args.message.as_bytes(), &args.address, &args.signature) {
        Ok(()) => {
            println!("{}", json!({ "success": true }));
            Ok(())
        }
        Err(e) => {
            println!("{}", json!({ "success": false, "error": format!("{:#}", e) }));
            std::process::exit(1);
        }
    }
}
