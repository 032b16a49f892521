use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::{Error, Result};

const SELECTOR_TOTAL_SUPPLY: [u8; 4] = [0x18, 0x16, 0x0d, 0xdd];
const SELECTOR_DECIMALS: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
const SELECTOR_GET_PAIR: [u8; 4] = [0xe6, 0xa4, 0x39, 0x05];
const SELECTOR_TOKEN0: [u8; 4] = [0x0d, 0xfe, 0x16, 0x81];
const SELECTOR_GET_RESERVES: [u8; 4] = [0x09, 0x02, 0xf1, 0xac];

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
const NATIVE_DECIMALS: u32 = 18;

/// Narrow read-only view of a token contract and its pool. Everything the
/// analytics pipeline needs from the chain, nothing more.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenReader: Send + Sync {
    /// Decimal-adjusted total supply of the token.
    async fn total_supply(&self, token: &str) -> Result<Decimal>;
    /// Decimal-adjusted wrapped-native reserve of the token's pool.
    async fn reference_reserve(&self, token: &str) -> Result<Decimal>;
    /// Pool contract address for the token / wrapped-native pair.
    async fn pair_address(&self, token: &str) -> Result<String>;
}

/// TokenReader over plain JSON-RPC `eth_call`; no full chain SDK, just the
/// four contract reads the pipeline depends on.
#[derive(Debug, Clone)]
pub struct EthRpcTokenReader {
    client: reqwest::Client,
    url: String,
    factory: String,
    wrapped_native: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<serde_json::Value>,
}

impl EthRpcTokenReader {
    pub fn new(
        url: impl Into<String>,
        factory: impl Into<String>,
        wrapped_native: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build RPC client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            factory: factory.into(),
            wrapped_native: wrapped_native.into().to_ascii_lowercase(),
        })
    }

    async fn eth_call(&self, to: &str, data: String) -> Result<Vec<u8>> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [{"to": to, "data": data}, "latest"],
            "id": 1,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("rpc call failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "rpc node returned {}",
                status
            )));
        }
        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("rpc response unreadable: {}", e)))?;
        if let Some(err) = parsed.error {
            return Err(Error::UpstreamUnavailable(format!("rpc error: {}", err)));
        }
        let result = parsed
            .result
            .ok_or_else(|| Error::validation("result", "rpc response has no result"))?;
        hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| Error::validation("result", format!("non-hex rpc result: {}", e)))
    }

    async fn pool_of(&self, token: &str) -> Result<String> {
        let data = call_data(SELECTOR_GET_PAIR, &[token, &self.wrapped_native])?;
        let raw = self.eth_call(&self.factory, data).await?;
        let pair = address_word(&raw)?;
        if pair == ZERO_ADDRESS {
            return Err(Error::PairNotFound(token.to_string()));
        }
        Ok(pair)
    }
}

#[async_trait]
impl TokenReader for EthRpcTokenReader {
    async fn total_supply(&self, token: &str) -> Result<Decimal> {
        let raw = self
            .eth_call(token, call_data(SELECTOR_DECIMALS, &[])?)
            .await?;
        let decimals = u128_word(&raw)? as u32;
        if decimals > 28 {
            return Err(Error::validation(
                "decimals",
                format!("unsupported token decimals {}", decimals),
            ));
        }

        let raw = self
            .eth_call(token, call_data(SELECTOR_TOTAL_SUPPLY, &[])?)
            .await?;
        scaled_decimal(u128_word(&raw)?, decimals, "totalSupply")
    }

    async fn reference_reserve(&self, token: &str) -> Result<Decimal> {
        let pool = self.pool_of(token).await?;

        let raw = self
            .eth_call(&pool, call_data(SELECTOR_TOKEN0, &[])?)
            .await?;
        let token0 = address_word(&raw)?;

        let raw = self
            .eth_call(&pool, call_data(SELECTOR_GET_RESERVES, &[])?)
            .await?;
        let reserve0 = u128_word(word_at(&raw, 0)?)?;
        let reserve1 = u128_word(word_at(&raw, 1)?)?;
        let reserve = if token0 == self.wrapped_native {
            reserve0
        } else {
            reserve1
        };
        scaled_decimal(reserve, NATIVE_DECIMALS, "reserves")
    }

    async fn pair_address(&self, token: &str) -> Result<String> {
        self.pool_of(token).await
    }
}

fn call_data(selector: [u8; 4], address_args: &[&str]) -> Result<String> {
    let mut data = selector.to_vec();
    for arg in address_args {
        data.extend_from_slice(&address_arg(arg)?);
    }
    Ok(format!("0x{}", hex::encode(data)))
}

fn address_arg(address: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(address.trim_start_matches("0x"))
        .map_err(|e| Error::validation("address", format!("non-hex address: {}", e)))?;
    if bytes.len() != 20 {
        return Err(Error::validation(
            "address",
            format!("expected 20 bytes, got {}", bytes.len()),
        ));
    }
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

fn word_at(raw: &[u8], index: usize) -> Result<&[u8]> {
    raw.get(index * 32..(index + 1) * 32)
        .ok_or_else(|| Error::validation("result", format!("missing word {} in rpc result", index)))
}

fn u128_word(raw: &[u8]) -> Result<u128> {
    let word = word_at(raw, 0)?;
    if word[..16].iter().any(|&b| b != 0) {
        return Err(Error::validation("result", "value exceeds 128 bits"));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

fn address_word(raw: &[u8]) -> Result<String> {
    let word = word_at(raw, 0)?;
    Ok(format!("0x{}", hex::encode(&word[12..])))
}

fn scaled_decimal(raw: u128, decimals: u32, field: &str) -> Result<Decimal> {
    Decimal::try_from_i128_with_scale(raw as i128, decimals)
        .map_err(|e| Error::validation(field, format!("value out of decimal range: {}", e)))
}
