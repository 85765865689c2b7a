//! 具重試與指數退避的 HTTP GET。
//!
//! 規則：
//! - 200：解析 JSON 後立即回傳
//! - 429：等待 `base_backoff_ms * 2^attempt` 後重試
//! - 其他狀態碼：不可重試，直接回傳 `None`
//! - 網路錯誤或逾時：等待後重試
//!
//! 失敗一律以 `None` 表示，不會回傳錯誤。

use crate::domain::ports::{Transport, TransportError, TransportResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub timeout_ms: u64,
    /// 單次等待上限；預設不設上限，維持純粹的倍增
    pub max_backoff_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 2000,
            timeout_ms: 10_000,
            max_backoff_ms: None,
        }
    }
}

impl RetryPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// 第 `attempt` 次（從 0 起算）失敗後的等待時間
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let wait = self.base_backoff_ms.saturating_mul(factor);
        let wait = match self.max_backoff_ms {
            Some(cap) => wait.min(cap),
            None => wait,
        };
        Duration::from_millis(wait)
    }

    /// 每次嘗試都逾時的最壞耗時（最後一次嘗試後不等待）
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        let waits: Duration = (0..attempts - 1).map(|a| self.backoff(a)).sum();
        self.timeout() * attempts + waits
    }
}

/// 以 reqwest 實作的 [`Transport`]
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn with_client(client: Client) -> Self {
        Self::new(Arc::new(ReqwestTransport::new(client)))
    }

    pub async fn fetch(
        &self,
        url: &str,
        query: &[(String, String)],
        policy: &RetryPolicy,
    ) -> Option<serde_json::Value> {
        for attempt in 0..policy.max_attempts {
            let is_last = attempt + 1 >= policy.max_attempts;

            tracing::debug!("📡 GET {} (attempt {}/{})", url, attempt + 1, policy.max_attempts);

            match self.transport.get(url, query, policy.timeout()).await {
                Ok(response) if response.status == 200 => {
                    return match serde_json::from_slice(&response.body) {
                        Ok(json) => Some(json),
                        Err(e) => {
                            tracing::error!("❌ Unparseable JSON body from {}: {}", url, e);
                            None
                        }
                    };
                }
                Ok(response) if response.status == 429 => {
                    if is_last {
                        tracing::warn!("⚠️ Rate limit hit on {}, no attempts left", url);
                        break;
                    }
                    let wait = policy.backoff(attempt);
                    tracing::warn!("⚠️ Rate limit hit on {}. Retrying in {:?}...", url, wait);
                    tokio::time::sleep(wait).await;
                }
                Ok(response) => {
                    tracing::error!("❌ API error ({}) from {}", response.status, url);
                    return None;
                }
                Err(e) => {
                    tracing::error!("❌ Fetch error from {}: {}", url, e);
                    if is_last {
                        break;
                    }
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
            }
        }

        tracing::error!("❌ Giving up on {} after {} attempts", url, policy.max_attempts);
        None
    }
}
