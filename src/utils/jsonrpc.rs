//! Sui JSON-RPC client

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::coin::{CoinClient, CoinMetadata, CoinPage, CoinTransfer};
use super::crypto::Keypair;
use super::publisher::TransactionSubmitter;
use super::types::{CompiledPackage, TransactionResponse};

/// Sui JSON-RPC client
pub struct JsonRpcClient {
    client: Client,
    url: String,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// Unsigned transaction returned by the `unsafe_*` builder methods
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBytes {
    /// Base64 BCS-encoded `TransactionData`
    pub tx_bytes: String,
}

impl JsonRpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }

    /// Make a JSON-RPC call
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        self.call_nullable(method, params)
            .await?
            .ok_or_else(|| anyhow!("{} returned no result", method))
    }

    /// Make a JSON-RPC call whose result may be `null`
    async fn call_nullable<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", method))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("RPC error {}: {}", status, body));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", method))?;

        if let Some(error) = envelope.error {
            return Err(anyhow!("{} failed ({}): {}", method, error.code, error.message));
        }
        Ok(envelope.result)
    }

    /// Build an unsigned publish transaction; the node selects the gas coin
    pub async fn unsafe_publish(
        &self,
        sender: &str,
        package: &CompiledPackage,
        gas_budget: u64,
    ) -> Result<TransactionBytes> {
        self.call(
            "unsafe_publish",
            json!([
                sender,
                package.modules,
                package.dependencies,
                Value::Null,
                gas_budget.to_string(),
            ]),
        )
        .await
    }

    /// Build an unsigned payment of non-SUI coins; the node selects the gas coin
    pub async fn unsafe_pay(
        &self,
        sender: &str,
        input_coins: &[String],
        recipients: &[String],
        amounts: &[u64],
        gas_budget: u64,
    ) -> Result<TransactionBytes> {
        let amounts: Vec<String> = amounts.iter().map(u64::to_string).collect();
        self.call(
            "unsafe_pay",
            json!([
                sender,
                input_coins,
                recipients,
                amounts,
                Value::Null,
                gas_budget.to_string(),
            ]),
        )
        .await
    }

    /// Build an unsigned SUI payment; the first input coin also pays for gas
    pub async fn unsafe_pay_sui(
        &self,
        sender: &str,
        input_coins: &[String],
        recipients: &[String],
        amounts: &[u64],
        gas_budget: u64,
    ) -> Result<TransactionBytes> {
        let amounts: Vec<String> = amounts.iter().map(u64::to_string).collect();
        self.call(
            "unsafe_paySui",
            json!([sender, input_coins, recipients, amounts, gas_budget.to_string()]),
        )
        .await
    }

    /// Decimals and symbol of a coin type, `None` if the type is unknown
    pub async fn get_coin_metadata(&self, coin_type: &str) -> Result<Option<CoinMetadata>> {
        self.call_nullable("suix_getCoinMetadata", json!([coin_type])).await
    }

    /// One page of the coins of `coin_type` owned by `owner`
    pub async fn get_coins(&self, owner: &str, coin_type: &str, cursor: Option<&str>) -> Result<CoinPage> {
        self.call("suix_getCoins", json!([owner, coin_type, cursor, Value::Null]))
            .await
    }

    /// Submit a signed transaction and wait for local execution
    pub async fn execute_transaction_block(
        &self,
        tx_bytes: &str,
        signature: &str,
    ) -> Result<TransactionResponse> {
        self.call(
            "sui_executeTransactionBlock",
            json!([
                tx_bytes,
                [signature],
                { "showEffects": true, "showObjectChanges": true },
                "WaitForLocalExecution",
            ]),
        )
        .await
    }
}

/// Publishes packages and sends coins through JSON-RPC, signing with a local key
pub struct RpcSubmitter {
    client: JsonRpcClient,
    keypair: Keypair,
    gas_budget: u64,
}

impl RpcSubmitter {
    pub fn new(client: JsonRpcClient, keypair: Keypair, gas_budget: u64) -> Self {
        Self {
            client,
            keypair,
            gas_budget,
        }
    }

    pub fn sender(&self) -> String {
        self.keypair.address()
    }

    /// Sign node-built transaction bytes and execute them
    async fn sign_and_execute(&self, unsigned: TransactionBytes) -> Result<TransactionResponse> {
        let tx_bytes = BASE64
            .decode(&unsigned.tx_bytes)
            .with_context(|| "Node returned invalid transaction bytes")?;
        let signature = self.keypair.sign_transaction(&tx_bytes);

        let progress = indicatif::ProgressBar::new_spinner();
        progress.set_message("Waiting for execution...");
        progress.enable_steady_tick(std::time::Duration::from_millis(100));

        let result = self
            .client
            .execute_transaction_block(&unsigned.tx_bytes, &signature)
            .await;

        progress.finish_and_clear();
        result
    }
}

#[async_trait]
impl TransactionSubmitter for RpcSubmitter {
    async fn publish(&self, package: &CompiledPackage) -> Result<TransactionResponse> {
        let sender = self.sender();
        tracing::debug!("Building publish transaction for sender {}", sender);

        let unsigned = self
            .client
            .unsafe_publish(&sender, package, self.gas_budget)
            .await?;
        self.sign_and_execute(unsigned).await
    }
}

#[async_trait]
impl CoinClient for RpcSubmitter {
    async fn coin_metadata(&self, coin_type: &str) -> Result<Option<CoinMetadata>> {
        self.client.get_coin_metadata(coin_type).await
    }

    async fn coins_page(&self, owner: &str, coin_type: &str, cursor: Option<&str>) -> Result<CoinPage> {
        self.client.get_coins(owner, coin_type, cursor).await
    }

    async fn transfer(&self, transfer: &CoinTransfer) -> Result<TransactionResponse> {
        let sender = self.sender();
        let recipients = [transfer.recipient.clone()];
        let amounts = [transfer.amount];
        tracing::debug!(
            "Building payment of {} {} from {} with {} input coins",
            transfer.amount,
            transfer.coin_type,
            sender,
            transfer.input_coins.len()
        );

        let unsigned = if transfer.pays_gas_from_inputs() {
            self.client
                .unsafe_pay_sui(&sender, &transfer.input_coins, &recipients, &amounts, transfer.gas_budget)
                .await?
        } else {
            self.client
                .unsafe_pay(&sender, &transfer.input_coins, &recipients, &amounts, transfer.gas_budget)
                .await?
        };
        self.sign_and_execute(unsigned).await
    }
}
