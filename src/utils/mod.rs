//! CLI utilities module

pub mod coin;
pub mod context;
pub mod crypto;
pub mod graphql;
pub mod jsonrpc;
pub mod manifest;
pub mod publisher;
pub mod toolchain;
pub mod types;
