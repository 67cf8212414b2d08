//! HTTP chain info provider for the EOSIO `/v1/chain` API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{checksum_from_hex, BlockRef, ChainHead, ChainInfoError, Checksum256};
use crate::ports::ChainInfoProvider;

/// Default request timeout.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct GetInfoResponse {
    head_block_num: u32,
    head_block_id: String,
    head_block_time: String,
    last_irreversible_block_num: u32,
}

#[derive(Debug, Serialize)]
struct GetBlockRequest {
    block_num_or_id: String,
}

#[derive(Debug, Deserialize)]
struct GetBlockResponse {
    id: String,
    block_num: u32,
}

/// Chain info provider backed by a node's HTTP API.
pub struct HttpChainInfoProvider {
    client: Client,
    base_url: String,
}

impl HttpChainInfoProvider {
    /// Provider for the API at `base_url` (e.g. `http://127.0.0.1:8888`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChainInfoError> {
        Self::with_timeout(base_url, DEFAULT_API_TIMEOUT)
    }

    /// Provider with an explicit request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ChainInfoError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ChainInfoError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize + ?Sized, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ChainInfoError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Chain API request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChainInfoError::Request(format!("{}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| ChainInfoError::Request(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| ChainInfoError::InvalidResponse(e.to_string()))
    }
}

fn parse_id(field: &str, value: &str) -> Result<Checksum256, ChainInfoError> {
    checksum_from_hex(value)
        .ok_or_else(|| ChainInfoError::InvalidResponse(format!("{} is not a 32-byte hex id: {}", field, value)))
}

/// Parse a block timestamp. The API omits the zone (`2018-06-14T17:06:21.500`);
/// it is always UTC.
fn parse_block_time(value: &str) -> Result<DateTime<Utc>, ChainInfoError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ChainInfoError::InvalidResponse(format!("bad block time {}: {}", value, e)))
}

#[async_trait]
impl ChainInfoProvider for HttpChainInfoProvider {
    async fn chain_head(&self) -> Result<ChainHead, ChainInfoError> {
        let info: GetInfoResponse = self.post("/v1/chain/get_info", &serde_json::json!({})).await?;

        Ok(ChainHead {
            head_block_num: info.head_block_num,
            head_block_id: parse_id("head_block_id", &info.head_block_id)?,
            head_block_time: parse_block_time(&info.head_block_time)?,
            last_irreversible_block_num: info.last_irreversible_block_num,
        })
    }

    async fn block_by_number(&self, block_num: u32) -> Result<BlockRef, ChainInfoError> {
        let request = GetBlockRequest {
            block_num_or_id: block_num.to_string(),
        };
        let block: GetBlockResponse = self.post("/v1/chain/get_block", &request).await?;

        Ok(BlockRef {
            block_num: block.block_num,
            id: parse_id("id", &block.id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_block_time_without_zone() {
        let t = parse_block_time("2018-06-14T17:06:21.500").unwrap();
        assert_eq!(t.year(), 2018);
        assert_eq!(t.hour(), 17);
        assert_eq!(t.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_parse_block_time_rfc3339() {
        let t = parse_block_time("2024-01-02T03:04:05Z").unwrap();
        assert_eq!(t.day(), 2);
        assert!(parse_block_time("yesterday").is_err());
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("id", &"01".repeat(32)).unwrap(), [1u8; 32]);
        assert!(matches!(
            parse_id("id", "00ff"),
            Err(ChainInfoError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = HttpChainInfoProvider::new("http://127.0.0.1:8888/").unwrap();
        assert_eq!(provider.base_url, "http://127.0.0.1:8888");
    }

    #[test]
    fn test_get_info_response_shape() {
        let body = r#"{
            "server_version": "0f6695cb",
            "chain_id": "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906",
            "head_block_num": 100,
            "last_irreversible_block_num": 90,
            "head_block_id": "0000006412b4d5e0c0da3d1c2ec4ccf1c2cb3b3b3c3d3e3f4041424344454647",
            "head_block_time": "2018-06-14T17:06:21.500",
            "head_block_producer": "eosio"
        }"#;
        let info: GetInfoResponse = serde_json::from_str(body).unwrap();
        assert_eq!(info.head_block_num, 100);
        assert_eq!(info.last_irreversible_block_num, 90);
        assert!(checksum_from_hex(&info.head_block_id).is_some());
    }
}
