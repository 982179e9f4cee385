//! Chain endpoint access.

use crate::error::{FaucetError, FaucetResult};
use async_trait::async_trait;
use mission_control_common::Address;
use serde_json::Value;
use tracing::debug;

/// Chain capabilities the faucet needs.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Balance of `address` in base units.
    async fn balance(&self, address: &Address) -> FaucetResult<u128>;

    /// Next nonce for `address`, counting pending transactions.
    async fn pending_nonce(&self, address: &Address) -> FaucetResult<u64>;

    async fn chain_id(&self) -> FaucetResult<u64>;

    /// Submit a signed, RLP-encoded transaction. Returns its hash.
    async fn send_raw_transaction(&self, raw: &[u8]) -> FaucetResult<String>;

    /// `None` while the transaction is not yet included, otherwise whether
    /// it executed successfully.
    async fn receipt_status(&self, tx_hash: &str) -> FaucetResult<Option<bool>>;
}

/// Ethereum JSON-RPC client over HTTP.
pub struct JsonRpcClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl JsonRpcClient {
    pub fn new(rpc_url: String) -> Self {
        Self {
            rpc_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.rpc_url
    }

    async fn call(&self, method: &str, params: Value) -> FaucetResult<Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        debug!(method, "RPC call");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FaucetError::Rpc(format!("Request failed: {}", e)))?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| FaucetError::Rpc(format!("Invalid response: {}", e)))?;

        if let Some(error) = json.get("error") {
            return Err(FaucetError::Rpc(format!("{} failed: {}", method, error)));
        }

        Ok(json.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn balance(&self, address: &Address) -> FaucetResult<u128> {
        let result = self
            .call("eth_getBalance", serde_json::json!([address.to_string(), "latest"]))
            .await?;
        parse_quantity(&result)
    }

    async fn pending_nonce(&self, address: &Address) -> FaucetResult<u64> {
        let result = self
            .call(
                "eth_getTransactionCount",
                serde_json::json!([address.to_string(), "pending"]),
            )
            .await?;
        let nonce = parse_quantity(&result)?;
        u64::try_from(nonce).map_err(|_| FaucetError::Rpc(format!("Nonce out of range: {}", nonce)))
    }

    async fn chain_id(&self) -> FaucetResult<u64> {
        let result = self.call("eth_chainId", serde_json::json!([])).await?;
        let chain_id = parse_quantity(&result)?;
        u64::try_from(chain_id).map_err(|_| FaucetError::Rpc(format!("Chain id out of range: {}", chain_id)))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> FaucetResult<String> {
        let result = self
            .call(
                "eth_sendRawTransaction",
                serde_json::json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FaucetError::Rpc("eth_sendRawTransaction returned no hash".to_string()))
    }

    async fn receipt_status(&self, tx_hash: &str) -> FaucetResult<Option<bool>> {
        let result = self
            .call("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
            .await?;
        receipt_status_from(&result)
    }
}

/// Decode a hex `QUANTITY` (`"0x1a"`).
pub fn parse_quantity(value: &Value) -> FaucetResult<u128> {
    let text = value
        .as_str()
        .ok_or_else(|| FaucetError::Rpc(format!("Expected hex quantity, got {}", value)))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| FaucetError::Rpc(format!("Invalid quantity {}: {}", text, e)))
}

fn receipt_status_from(receipt: &Value) -> FaucetResult<Option<bool>> {
    if receipt.is_null() {
        return Ok(None);
    }
    match receipt.get("status") {
        // Pre-Byzantium receipts carry no status; inclusion is success.
        None | Some(Value::Null) => Ok(Some(true)),
        Some(status) => Ok(Some(parse_quantity(status)? == 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x0")).unwrap(), 0);
        assert_eq!(parse_quantity(&json!("0x")).unwrap(), 0);
        assert_eq!(parse_quantity(&json!("0x8ac7230489e80000")).unwrap(), 10_000_000_000_000_000_000);
        assert!(parse_quantity(&json!("0xzz")).is_err());
        assert!(parse_quantity(&json!(12)).is_err());
    }

    #[test]
    fn test_receipt_status() {
        assert_eq!(receipt_status_from(&Value::Null).unwrap(), None);
        assert_eq!(receipt_status_from(&json!({"status": "0x1"})).unwrap(), Some(true));
        assert_eq!(receipt_status_from(&json!({"status": "0x0"})).unwrap(), Some(false));
        assert_eq!(receipt_status_from(&json!({"blockNumber": "0x5"})).unwrap(), Some(true));
    }
}
