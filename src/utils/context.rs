//! CLI context and global configuration

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use super::crypto::Keypair;
use super::graphql::GraphQlClient;
use super::jsonrpc::JsonRpcClient;
use super::toolchain::SuiCli;
use super::types::SuiNetwork;

/// CLI execution context
#[derive(Clone)]
pub struct CliContext {
    /// Sui network
    pub network: SuiNetwork,
    /// JSON-RPC endpoint override
    rpc_url: Option<String>,
    /// GraphQL endpoint override
    graphql_url: Option<String>,
    /// Signing keypair (loaded lazily)
    signing_key_path: Option<PathBuf>,
    /// `sui` binary used for builds and lock-file management
    pub sui_bin: String,
    /// Suppress progress output
    pub quiet: bool,
}

impl CliContext {
    pub fn new(
        network: &str,
        rpc_url: Option<&str>,
        graphql_url: Option<&str>,
        signing_key: Option<&str>,
        sui_bin: &str,
        quiet: bool,
    ) -> Result<Self> {
        let network = match network.to_lowercase().as_str() {
            "mainnet" => SuiNetwork::Mainnet,
            "testnet" => SuiNetwork::Testnet,
            "devnet" => SuiNetwork::Devnet,
            "localnet" => SuiNetwork::Localnet,
            _ => {
                return Err(anyhow!(
                    "Invalid network: {}. Use mainnet, testnet, devnet, or localnet",
                    network
                ))
            }
        };

        Ok(Self {
            network,
            rpc_url: rpc_url.map(String::from),
            graphql_url: graphql_url.map(String::from),
            signing_key_path: signing_key.map(PathBuf::from),
            sui_bin: sui_bin.to_string(),
            quiet,
        })
    }

    /// Get the JSON-RPC URL for this network
    pub fn rpc_url(&self) -> &str {
        if let Some(url) = &self.rpc_url {
            return url;
        }
        match self.network {
            SuiNetwork::Mainnet => "https://fullnode.mainnet.sui.io:443",
            SuiNetwork::Testnet => "https://fullnode.testnet.sui.io:443",
            SuiNetwork::Devnet => "https://fullnode.devnet.sui.io:443",
            SuiNetwork::Localnet => "http://127.0.0.1:9000",
        }
    }

    /// Get the GraphQL URL for this network
    pub fn graphql_url(&self) -> &str {
        if let Some(url) = &self.graphql_url {
            return url;
        }
        match self.network {
            SuiNetwork::Mainnet => "https://graphql.mainnet.sui.io/graphql",
            SuiNetwork::Testnet => "https://graphql.testnet.sui.io/graphql",
            SuiNetwork::Devnet => "https://graphql.devnet.sui.io/graphql",
            SuiNetwork::Localnet => "http://127.0.0.1:9125/graphql",
        }
    }

    pub fn graphql_client(&self) -> GraphQlClient {
        GraphQlClient::new(self.graphql_url())
    }

    pub fn rpc_client(&self) -> JsonRpcClient {
        JsonRpcClient::new(self.rpc_url())
    }

    pub fn sui_cli(&self) -> SuiCli {
        SuiCli::new(&self.sui_bin)
    }

    /// Load the signing keypair
    pub fn load_signing_key(&self) -> Result<Keypair> {
        let path = self
            .signing_key_path
            .as_ref()
            .ok_or_else(|| anyhow!("Signing key required. Set --signing-key or SUI_SIGNING_KEY"))?;

        Keypair::from_file(path)
    }

    /// Get network as string
    pub fn network(&self) -> &str {
        self.network.as_str()
    }
}
