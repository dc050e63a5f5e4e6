//! Coin transfers
//!
//! Amounts are given in whole-coin units (`0.5` SUI) and converted to base
//! units with the coin's metadata. Input coins are picked largest first until
//! they cover the amount. For SUI the same coins also pay for gas, so the gas
//! budget is added to what they must cover.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::crypto::normalize_address;
use super::types::TransactionResponse;

/// Canonical form of the SUI coin type's package address
const SUI_FRAMEWORK_ADDRESS: &str = "0x0000000000000000000000000000000000000000000000000000000000000002";

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Invalid recipient {0:?}")]
    InvalidRecipient(String),

    #[error("No coin metadata found for {0}")]
    UnknownCoinType(String),

    #[error("Coin {coin_id} has an unreadable balance {balance:?}")]
    InvalidBalance { coin_id: String, balance: String },

    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("Transfer failed: {0}")]
    ExecutionFailed(String),

    #[error("RPC request failed: {0:#}")]
    Rpc(anyhow::Error),
}

/// Subset of `suix_getCoinMetadata`
#[derive(Debug, Clone, Deserialize)]
pub struct CoinMetadata {
    pub decimals: u8,
    #[serde(default)]
    pub symbol: String,
}

/// One coin object from `suix_getCoins`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinObject {
    pub coin_object_id: String,
    /// Base units, encoded as a decimal string
    pub balance: String,
}

impl CoinObject {
    pub fn balance(&self) -> Result<u64, TransferError> {
        self.balance.parse().map_err(|_| TransferError::InvalidBalance {
            coin_id: self.coin_object_id.clone(),
            balance: self.balance.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinPage {
    pub data: Vec<CoinObject>,
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_next_page: bool,
}

/// A single-recipient payment, ready to be built and signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinTransfer {
    pub coin_type: String,
    pub input_coins: Vec<String>,
    pub recipient: String,
    /// Base units
    pub amount: u64,
    pub gas_budget: u64,
}

impl CoinTransfer {
    /// SUI payments take gas from the input coins; other coins use a
    /// separate gas coin chosen by the node
    pub fn pays_gas_from_inputs(&self) -> bool {
        is_sui_coin_type(&self.coin_type)
    }
}

/// Chain access needed to send coins from the active key
#[async_trait]
pub trait CoinClient {
    async fn coin_metadata(&self, coin_type: &str) -> anyhow::Result<Option<CoinMetadata>>;

    async fn coins_page(
        &self,
        owner: &str,
        coin_type: &str,
        cursor: Option<&str>,
    ) -> anyhow::Result<CoinPage>;

    /// Build, sign, and execute the payment
    async fn transfer(&self, transfer: &CoinTransfer) -> anyhow::Result<TransactionResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSendReceipt {
    pub digest: String,
    /// Base units sent
    pub amount: u64,
    pub symbol: String,
    pub recipient: String,
}

/// Whether `coin_type` is `0x2::sui::SUI`, in short or long address form
pub fn is_sui_coin_type(coin_type: &str) -> bool {
    let mut parts = coin_type.trim().splitn(3, "::");
    let (Some(address), Some(module), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    module == "sui"
        && name == "SUI"
        && normalize_address(address).is_ok_and(|a| a == SUI_FRAMEWORK_ADDRESS)
}

/// Convert a decimal amount in whole-coin units to base units
pub fn parse_amount(amount: &str, decimals: u8) -> Result<u64, TransferError> {
    let invalid = |reason: String| TransferError::InvalidAmount {
        amount: amount.to_string(),
        reason,
    };

    let trimmed = amount.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("empty".to_string()));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a decimal number".to_string()));
    }
    if fraction.len() > usize::from(decimals) {
        return Err(invalid(format!("more than {} decimal places", decimals)));
    }

    let digits = format!("{}{:0<width$}", whole, fraction, width = usize::from(decimals));
    let base_units = digits
        .parse::<u128>()
        .ok()
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| invalid("too large".to_string()))?;
    if base_units == 0 {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(base_units)
}

/// Pick coins, largest first, until their balances cover `needed`
pub fn select_coins(coins: &[CoinObject], needed: u128) -> Result<Vec<String>, TransferError> {
    let mut balances = coins
        .iter()
        .map(|c| Ok((c.coin_object_id.as_str(), c.balance()?)))
        .collect::<Result<Vec<_>, TransferError>>()?;
    balances.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut total: u128 = 0;
    let mut selected = Vec::new();
    for (id, balance) in balances {
        if total >= needed {
            break;
        }
        total += u128::from(balance);
        selected.push(id.to_string());
    }

    if total < needed {
        return Err(TransferError::InsufficientBalance {
            needed,
            available: total,
        });
    }
    Ok(selected)
}

/// Fetch every coin of `coin_type` owned by `owner`
async fn owned_coins<C>(client: &C, owner: &str, coin_type: &str) -> Result<Vec<CoinObject>, TransferError>
where
    C: CoinClient + Sync + ?Sized,
{
    let mut coins = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = client
            .coins_page(owner, coin_type, cursor.as_deref())
            .await
            .map_err(TransferError::Rpc)?;
        coins.extend(page.data);
        if !page.has_next_page || page.next_cursor.is_none() {
            break;
        }
        cursor = page.next_cursor;
    }
    Ok(coins)
}

/// Send `amount` (whole-coin units) of `coin_type` from `sender` to `recipient`
pub async fn send_coin<C>(
    client: &C,
    sender: &str,
    coin_type: &str,
    amount: &str,
    recipient: &str,
    gas_budget: u64,
) -> Result<CoinSendReceipt, TransferError>
where
    C: CoinClient + Sync + ?Sized,
{
    let recipient =
        normalize_address(recipient).map_err(|_| TransferError::InvalidRecipient(recipient.to_string()))?;

    let metadata = client
        .coin_metadata(coin_type)
        .await
        .map_err(TransferError::Rpc)?
        .ok_or_else(|| TransferError::UnknownCoinType(coin_type.to_string()))?;
    let base_units = parse_amount(amount, metadata.decimals)?;

    let coins = owned_coins(client, sender, coin_type).await?;
    tracing::debug!("{} owns {} coins of {}", sender, coins.len(), coin_type);

    let mut needed = u128::from(base_units);
    if is_sui_coin_type(coin_type) {
        needed += u128::from(gas_budget);
    }
    let input_coins = select_coins(&coins, needed)?;

    let transfer = CoinTransfer {
        coin_type: coin_type.to_string(),
        input_coins,
        recipient: recipient.clone(),
        amount: base_units,
        gas_budget,
    };
    let response = client.transfer(&transfer).await.map_err(TransferError::Rpc)?;

    match response.effects.as_ref().map(|e| &e.status) {
        Some(status) if status.is_success() => {}
        Some(status) => {
            return Err(TransferError::ExecutionFailed(
                status.error.clone().unwrap_or_else(|| status.status.clone()),
            ))
        }
        None => {
            return Err(TransferError::ExecutionFailed(
                "transaction effects missing from response".to_string(),
            ))
        }
    }

    Ok(CoinSendReceipt {
        digest: response.digest,
        amount: base_units,
        symbol: metadata.symbol,
        recipient,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::{ExecutionStatus, TransactionEffects};
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SUI: &str = "0x2::sui::SUI";
    const USDC: &str = "0xdba3::usdc::USDC";
    const SENDER: &str = "0x00000000000000000000000000000000000000000000000000000000000000a1";

    fn coin(id: &str, balance: u64) -> CoinObject {
        CoinObject {
            coin_object_id: id.to_string(),
            balance: balance.to_string(),
        }
    }

    /// Serves coins in pages of `page_size` and records every transfer
    struct FakeWallet {
        metadata: HashMap<String, CoinMetadata>,
        coins: Vec<CoinObject>,
        page_size: usize,
        status: &'static str,
        pages_requested: Mutex<Vec<Option<String>>>,
        transfers: Mutex<Vec<CoinTransfer>>,
    }

    impl FakeWallet {
        fn new(coins: Vec<CoinObject>) -> Self {
            let metadata = [
                (SUI.to_string(), CoinMetadata { decimals: 9, symbol: "SUI".to_string() }),
                (USDC.to_string(), CoinMetadata { decimals: 6, symbol: "USDC".to_string() }),
            ]
            .into_iter()
            .collect();
            Self {
                metadata,
                coins,
                page_size: 50,
                status: "success",
                pages_requested: Mutex::new(Vec::new()),
                transfers: Mutex::new(Vec::new()),
            }
        }

        fn transfers(&self) -> Vec<CoinTransfer> {
            self.transfers.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CoinClient for FakeWallet {
        async fn coin_metadata(&self, coin_type: &str) -> anyhow::Result<Option<CoinMetadata>> {
            Ok(self.metadata.get(coin_type).cloned())
        }

        async fn coins_page(
            &self,
            owner: &str,
            _coin_type: &str,
            cursor: Option<&str>,
        ) -> anyhow::Result<CoinPage> {
            if owner != SENDER {
                return Err(anyhow!("unexpected owner {}", owner));
            }
            self.pages_requested.lock().unwrap().push(cursor.map(String::from));
            let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let end = (start + self.page_size).min(self.coins.len());
            Ok(CoinPage {
                data: self.coins[start..end].to_vec(),
                next_cursor: Some(end.to_string()),
                has_next_page: end < self.coins.len(),
            })
        }

        async fn transfer(&self, transfer: &CoinTransfer) -> anyhow::Result<TransactionResponse> {
            self.transfers.lock().unwrap().push(transfer.clone());
            Ok(TransactionResponse {
                digest: "9XkP2digest".to_string(),
                effects: Some(TransactionEffects {
                    status: ExecutionStatus {
                        status: self.status.to_string(),
                        error: (self.status != "success").then(|| "InsufficientCoinBalance".to_string()),
                    },
                }),
                object_changes: Vec::new(),
            })
        }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("0.5", 9).unwrap(), 500_000_000);
        assert_eq!(parse_amount("1", 9).unwrap(), 1_000_000_000);
        assert_eq!(parse_amount("12.345678", 6).unwrap(), 12_345_678);
        assert_eq!(parse_amount(".25", 2).unwrap(), 25);
        assert_eq!(parse_amount("3.", 0).unwrap(), 3);
    }

    #[test]
    fn test_parse_amount_rejects_bad_input() {
        for bad in ["", ".", "abc", "-1", "1.2.3", "0", "0.000", "1e9"] {
            assert!(
                matches!(parse_amount(bad, 9), Err(TransferError::InvalidAmount { .. })),
                "{bad:?} should be rejected"
            );
        }
        // Finer than the coin can represent
        assert!(parse_amount("0.0000001", 6).is_err());
        // Overflows u64 base units
        assert!(parse_amount("20000000000", 9).is_err());
    }

    #[test]
    fn test_is_sui_coin_type() {
        assert!(is_sui_coin_type("0x2::sui::SUI"));
        assert!(is_sui_coin_type(
            "0x0000000000000000000000000000000000000000000000000000000000000002::sui::SUI"
        ));
        assert!(!is_sui_coin_type("0x3::sui::SUI"));
        assert!(!is_sui_coin_type(USDC));
        assert!(!is_sui_coin_type("SUI"));
    }

    #[test]
    fn test_select_coins_largest_first() {
        let coins = vec![coin("0x1", 10), coin("0x2", 70), coin("0x3", 40)];
        assert_eq!(select_coins(&coins, 60).unwrap(), vec!["0x2"]);
        assert_eq!(select_coins(&coins, 100).unwrap(), vec!["0x2", "0x3"]);
        assert!(matches!(
            select_coins(&coins, 121),
            Err(TransferError::InsufficientBalance { needed: 121, available: 120 })
        ));
    }

    #[test]
    fn test_select_coins_rejects_unreadable_balance() {
        let coins = vec![CoinObject {
            coin_object_id: "0x1".to_string(),
            balance: "lots".to_string(),
        }];
        assert!(matches!(select_coins(&coins, 1), Err(TransferError::InvalidBalance { .. })));
    }

    #[tokio::test]
    async fn test_send_sui_covers_gas_from_inputs() {
        let wallet = FakeWallet::new(vec![coin("0x1", 600_000_000), coin("0x2", 300_000_000)]);

        let receipt = send_coin(&wallet, SENDER, SUI, "0.5", "0xb0b", 200_000_000)
            .await
            .unwrap();

        assert_eq!(receipt.amount, 500_000_000);
        assert_eq!(receipt.symbol, "SUI");
        assert_eq!(receipt.digest, "9XkP2digest");
        assert_eq!(receipt.recipient, format!("0x{:0>64}", "b0b"));

        let transfers = wallet.transfers();
        assert_eq!(transfers.len(), 1);
        // 0.5 SUI plus a 0.2 SUI budget needs both coins
        assert_eq!(transfers[0].input_coins, vec!["0x1", "0x2"]);
        assert!(transfers[0].pays_gas_from_inputs());
    }

    #[tokio::test]
    async fn test_send_other_coin_ignores_gas_budget() {
        let wallet = FakeWallet::new(vec![coin("0x1", 1_000_000), coin("0x2", 2_500_000)]);

        send_coin(&wallet, SENDER, USDC, "2.5", "0xb0b", 200_000_000)
            .await
            .unwrap();

        let transfers = wallet.transfers();
        assert_eq!(transfers[0].input_coins, vec!["0x2"]);
        assert_eq!(transfers[0].amount, 2_500_000);
        assert!(!transfers[0].pays_gas_from_inputs());
    }

    #[tokio::test]
    async fn test_coins_are_collected_across_pages() {
        let coins = (1..=5).map(|i| coin(&format!("0x{}", i), 1_000_000)).collect();
        let mut wallet = FakeWallet::new(coins);
        wallet.page_size = 2;

        send_coin(&wallet, SENDER, USDC, "5", "0xb0b", 0).await.unwrap();

        assert_eq!(
            wallet.pages_requested.lock().unwrap().clone(),
            vec![None, Some("2".to_string()), Some("4".to_string())]
        );
        assert_eq!(wallet.transfers()[0].input_coins.len(), 5);
    }

    #[tokio::test]
    async fn test_insufficient_balance_sends_nothing() {
        let wallet = FakeWallet::new(vec![coin("0x1", 1_000_000)]);

        let err = send_coin(&wallet, SENDER, USDC, "2", "0xb0b", 0).await.unwrap_err();

        assert!(matches!(err, TransferError::InsufficientBalance { .. }));
        assert!(wallet.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_coin_type() {
        let wallet = FakeWallet::new(Vec::new());
        let err = send_coin(&wallet, SENDER, "0x9::fake::FAKE", "1", "0xb0b", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::UnknownCoinType(_)));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected_before_any_request() {
        let wallet = FakeWallet::new(vec![coin("0x1", 1_000_000)]);
        let err = send_coin(&wallet, SENDER, USDC, "1", "not-an-address", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidRecipient(_)));
        assert!(wallet.pages_requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_execution_status() {
        let mut wallet = FakeWallet::new(vec![coin("0x1", 1_000_000)]);
        wallet.status = "failure";

        let err = send_coin(&wallet, SENDER, USDC, "1", "0xb0b", 0).await.unwrap_err();

        assert!(matches!(err, TransferError::ExecutionFailed(ref e) if e == "InsufficientCoinBalance"));
    }
}
